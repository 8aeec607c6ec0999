//! Popup windows: content-sized centered boxes and key pickers.

use crate::cursor::Cursor;
use crate::window::{KeyOutcome, Rect, Window, WindowState};

/// A centered box that sizes itself from its content.
///
/// Closes on `q` or Esc. A cursor appears automatically when the
/// content overflows the box.
pub struct PopupWindow {
    state: WindowState,
    max_height: u16,
    screen: (u16, u16),
    auto_cursor: bool,
}

impl PopupWindow {
    /// Creates a popup; `max_height` bounds the box including its
    /// borders.
    #[must_use]
    pub fn new(caption: impl Into<String>, max_height: u16) -> Self {
        let mut state = WindowState::new(caption);
        state.set_boxed(true);
        Self {
            state,
            max_height,
            screen: (0, 0),
            auto_cursor: true,
        }
    }

    /// Replaces the content and re-fits the box.
    pub fn set_content<S: AsRef<str>>(
        &mut self,
        lines: impl IntoIterator<Item = S>,
    ) {
        self.state.set_content(lines);
        self.fit();
    }

    /// Disables the automatic cursor; the caller manages it.
    pub fn set_auto_cursor(&mut self, auto_cursor: bool) {
        self.auto_cursor = auto_cursor;
    }

    /// Sizes the box from the content and centers it, clamped to 80%
    /// of the screen in both directions.
    fn fit(&mut self) {
        let (screen_width, screen_height) = self.screen;
        if screen_width == 0 || screen_height == 0 {
            return;
        }

        let content_width = self
            .state
            .lines()
            .iter()
            .map(|l| crate::text::display_width(l))
            .max()
            .unwrap_or(0) as u16;
        let wanted_width = content_width + 4;
        let wanted_height =
            (self.state.line_count() as u16 + 2).min(self.max_height);

        let screen_cap_w = (u32::from(screen_width) * 4 / 5) as u16;
        let screen_cap_h = (u32::from(screen_height) * 4 / 5) as u16;
        let width = wanted_width.min(screen_cap_w).max(2);
        let height = wanted_height.min(screen_cap_h).max(2);
        let x = (screen_width - width) / 2;
        let y = (screen_height - height) / 2;
        self.state.set_rect(Rect::new(x, y, width, height));

        if self.auto_cursor {
            let overflow =
                self.state.line_count() > self.state.viewport_lines();
            match (overflow, self.state.cursor()) {
                (true, Cursor::None) => {
                    self.state.set_cursor(Cursor::free());
                }
                (false, cursor) if *cursor != Cursor::None => {
                    self.state.set_cursor(Cursor::None);
                }
                _ => {}
            }
        }
    }
}

impl Window for PopupWindow {
    fn state(&self) -> &WindowState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut WindowState {
        &mut self.state
    }

    fn handle_key(&mut self, key: &str) -> KeyOutcome {
        match self.state.default_key(key) {
            KeyOutcome::Ignored => match key {
                "q" | "esc" => KeyOutcome::Close,
                // Popups are modal; unknown keys stop here.
                _ => KeyOutcome::Consumed,
            },
            outcome => outcome,
        }
    }

    fn layout(&mut self, screen_width: u16, screen_height: u16) {
        self.screen = (screen_width, screen_height);
        self.fit();
    }
}

struct PickerOption {
    key: char,
    label: String,
    action: Box<dyn FnMut()>,
}

/// A popup mapping single-character keys to callbacks.
///
/// Pressing a listed key, or Enter with the cursor on an option, runs
/// the callback and closes; any other key closes silently.
pub struct PickerWindow {
    popup: PopupWindow,
    options: Vec<PickerOption>,
}

impl PickerWindow {
    /// Creates an empty picker.
    #[must_use]
    pub fn new(caption: impl Into<String>) -> Self {
        let mut popup = PopupWindow::new(caption, 20);
        popup.set_auto_cursor(false);
        Self {
            popup,
            options: Vec::new(),
        }
    }

    /// Adds an option; builder style.
    #[must_use]
    pub fn option(
        mut self,
        key: char,
        label: impl Into<String>,
        action: impl FnMut() + 'static,
    ) -> Self {
        self.options.push(PickerOption {
            key,
            label: label.into(),
            action: Box::new(action),
        });
        self.rebuild_content();
        self
    }

    fn rebuild_content(&mut self) {
        let lines: Vec<String> = self
            .options
            .iter()
            .map(|o| format!("{}  {}", o.key, o.label))
            .collect();
        self.popup.set_content(lines);
        self.popup.state_mut().set_cursor(Cursor::free());
    }

    fn run_option(&mut self, index: usize) -> KeyOutcome {
        if let Some(option) = self.options.get_mut(index) {
            (option.action)();
        }
        KeyOutcome::Close
    }
}

impl Window for PickerWindow {
    fn state(&self) -> &WindowState {
        self.popup.state()
    }

    fn state_mut(&mut self) -> &mut WindowState {
        self.popup.state_mut()
    }

    fn handle_key(&mut self, key: &str) -> KeyOutcome {
        if let KeyOutcome::Consumed = self.popup.state_mut().default_key(key)
        {
            return KeyOutcome::Consumed;
        }

        if key == "enter" {
            if let Some(pos) = self.popup.state().cursor().position() {
                return self.run_option(pos);
            }
            return KeyOutcome::Close;
        }

        let mut single = key.chars();
        if let (Some(c), None) = (single.next(), single.next()) {
            if let Some(index) =
                self.options.iter().position(|o| o.key == c)
            {
                return self.run_option(index);
            }
        }

        // Anything unrecognized closes silently.
        KeyOutcome::Close
    }

    fn layout(&mut self, screen_width: u16, screen_height: u16) {
        self.popup.layout(screen_width, screen_height);
    }
}
