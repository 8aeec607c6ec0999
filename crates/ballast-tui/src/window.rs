//! The window base: geometry, content, scrolling and default input
//! handling.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Print;

use crate::cursor::Cursor;
use crate::event::{MouseButton, MouseEvent};
use crate::text::{clip_to_width, display_width};

/// A rectangle in screen cells, 0-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    /// Left column.
    pub x: u16,
    /// Top row.
    pub y: u16,
    /// Width in columns.
    pub width: u16,
    /// Height in rows.
    pub height: u16,
}

impl Rect {
    /// Creates a rect.
    #[must_use]
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the point lies inside.
    #[must_use]
    pub fn contains(&self, column: u16, row: u16) -> bool {
        column >= self.x
            && column < self.x + self.width
            && row >= self.y
            && row < self.y + self.height
    }
}

/// What a window did with an input event.
pub enum KeyOutcome {
    /// Not interested; the caller may act on it.
    Ignored,
    /// Handled.
    Consumed,
    /// Handled; close this window (popups).
    Close,
    /// Handled; open the given popup on top.
    Popup(Rc<RefCell<dyn Window>>),
}

/// Shared state and mechanics of every visible window.
///
/// Setters record invalidation; nothing draws until the screen's
/// coalesced repaint runs.
pub struct WindowState {
    rect: Rect,
    caption: String,
    lines: Vec<String>,
    top_line: usize,
    cursor: Cursor,
    auto_scroll: bool,
    active: bool,
    dirty: bool,
    boxed: bool,
    hint: String,
}

impl WindowState {
    /// Creates an empty window with a caption and no cursor.
    #[must_use]
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            rect: Rect::default(),
            caption: caption.into(),
            lines: Vec::new(),
            top_line: 0,
            cursor: Cursor::None,
            auto_scroll: false,
            active: false,
            dirty: true,
            boxed: false,
            hint: String::new(),
        }
    }

    /// The window's rectangle.
    #[must_use]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Moves/resizes the window.
    pub fn set_rect(&mut self, rect: Rect) {
        if self.rect != rect {
            self.rect = rect;
            self.scroll_cursor_into_view();
            self.dirty = true;
        }
    }

    /// The caption text.
    #[must_use]
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Replaces the caption.
    pub fn set_caption(&mut self, caption: impl Into<String>) {
        self.caption = caption.into();
        self.dirty = true;
    }

    /// Content lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of content lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Rows available for content.
    #[must_use]
    pub fn viewport_lines(&self) -> usize {
        let chrome = if self.boxed { 2 } else { 1 };
        usize::from(self.rect.height.saturating_sub(chrome))
    }

    /// Columns available for content.
    #[must_use]
    pub fn viewport_columns(&self) -> usize {
        let chrome = if self.boxed { 4 } else { 0 };
        usize::from(self.rect.width.saturating_sub(chrome))
    }

    /// First visible content line.
    #[must_use]
    pub fn top_line(&self) -> usize {
        self.top_line
    }

    /// Replaces all content. Splits embedded newlines; snaps to the
    /// bottom when auto-scroll is on.
    pub fn set_content<S: AsRef<str>>(&mut self, lines: impl IntoIterator<Item = S>) {
        self.lines = split_lines(lines);
        self.cursor.clamp(self.lines.len());
        self.after_content_change();
    }

    /// Appends one chunk, splitting embedded newlines.
    pub fn add_line(&mut self, line: impl AsRef<str>) {
        self.add_lines([line]);
    }

    /// Appends several chunks, splitting embedded newlines.
    pub fn add_lines<S: AsRef<str>>(&mut self, lines: impl IntoIterator<Item = S>) {
        self.lines.extend(split_lines(lines));
        self.after_content_change();
    }

    fn after_content_change(&mut self) {
        if self.auto_scroll {
            self.top_line =
                self.lines.len().saturating_sub(self.viewport_lines());
        } else {
            self.scroll_cursor_into_view();
        }
        self.dirty = true;
    }

    /// Enables or disables snap-to-bottom on content changes.
    pub fn set_auto_scroll(&mut self, auto_scroll: bool) {
        self.auto_scroll = auto_scroll;
    }

    /// The cursor.
    #[must_use]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Replaces the cursor and scrolls it into view.
    pub fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
        self.cursor.clamp(self.lines.len());
        self.scroll_cursor_into_view();
        self.dirty = true;
    }

    /// Whether this is the active (input-receiving) tiled window.
    #[must_use]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Marks the window active/inactive.
    pub fn set_active(&mut self, active: bool) {
        if self.active != active {
            self.active = active;
            self.dirty = true;
        }
    }

    /// Whether the window needs repainting.
    #[must_use]
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the window for the next repaint.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Draws the window with a surrounding box (popups).
    pub fn set_boxed(&mut self, boxed: bool) {
        self.boxed = boxed;
        self.dirty = true;
    }

    /// The keyboard hint shown in the status bar while active.
    #[must_use]
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Sets the keyboard hint.
    pub fn set_hint(&mut self, hint: impl Into<String>) {
        self.hint = hint.into();
    }

    fn scroll_cursor_into_view(&mut self) {
        let Some(pos) = self.cursor.position() else {
            return;
        };
        let viewport = self.viewport_lines();
        if viewport == 0 {
            return;
        }
        if pos < self.top_line {
            self.top_line = pos;
        } else if pos >= self.top_line + viewport {
            self.top_line = pos + 1 - viewport;
        }
    }

    /// Default key map. Navigation only; anything else is ignored.
    pub fn default_key(&mut self, key: &str) -> KeyOutcome {
        if self.cursor == Cursor::None {
            return KeyOutcome::Ignored;
        }
        let len = self.lines.len();
        let viewport = self.viewport_lines() as isize;

        match key {
            "up" | "k" => {
                self.cursor.step(-1, len);
            }
            "down" | "j" => {
                self.cursor.step(1, len);
            }
            "page_up" => {
                self.cursor.step(-viewport, len);
            }
            "page_down" => {
                self.cursor.step(viewport, len);
            }
            "ctrl_u" => {
                self.cursor.step(-(viewport / 2).max(1), len);
            }
            "ctrl_d" => {
                self.cursor.step((viewport / 2).max(1), len);
            }
            "home" => self.cursor.first(),
            "end" => self.cursor.last(len),
            _ => return KeyOutcome::Ignored,
        }

        self.scroll_cursor_into_view();
        self.dirty = true;
        KeyOutcome::Consumed
    }

    /// Default mouse map: wheel moves the cursor by four, a left click
    /// inside the viewport moves the cursor to the clicked line.
    pub fn default_mouse(&mut self, event: &MouseEvent) -> KeyOutcome {
        if self.cursor == Cursor::None {
            return KeyOutcome::Ignored;
        }
        let len = self.lines.len();

        let moved = match event.button {
            MouseButton::ScrollUp => self.cursor.step(-4, len),
            MouseButton::ScrollDown => self.cursor.step(4, len),
            MouseButton::Left => {
                // Row 0 is the caption (or top border); content starts
                // one row down either way.
                let content_top = self.rect.y + 1;
                if !self.rect.contains(event.column, event.row)
                    || event.row < content_top
                {
                    return KeyOutcome::Ignored;
                }
                let clicked =
                    self.top_line + usize::from(event.row - content_top);
                self.cursor.set(clicked, len)
            }
            _ => return KeyOutcome::Ignored,
        };

        if moved {
            self.scroll_cursor_into_view();
            self.dirty = true;
        }
        KeyOutcome::Consumed
    }

    /// Paints the window and clears the dirty flag.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the terminal fails.
    pub fn draw(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        if self.boxed {
            self.draw_boxed(out)?;
        } else {
            self.draw_tiled(out)?;
        }
        self.dirty = false;
        Ok(())
    }

    fn draw_tiled(&self, out: &mut impl Write) -> std::io::Result<()> {
        let width = usize::from(self.rect.width);
        if width == 0 || self.rect.height == 0 {
            return Ok(());
        }

        // Caption row, reverse video when active.
        let caption = pad_to_width(&format!(" {} ", self.caption), width);
        let styled = if self.active {
            format!("\x1b[7;1m{caption}\x1b[0m")
        } else {
            format!("\x1b[7m{caption}\x1b[0m")
        };
        queue!(out, MoveTo(self.rect.x, self.rect.y), Print(styled))?;

        let cursor_pos = self.cursor.position();
        for row in 0..self.viewport_lines() {
            let index = self.top_line + row;
            let line = self.lines.get(index).map_or("", |l| l.as_str());
            let mut rendered =
                pad_to_width(&clip_to_width(line, width), width);
            if Some(index) == cursor_pos && !self.lines.is_empty() {
                rendered = format!("\x1b[7m{}\x1b[0m", strip_for_cursor(&rendered));
            }
            queue!(
                out,
                MoveTo(self.rect.x, self.rect.y + 1 + row as u16),
                Print(rendered)
            )?;
        }

        Ok(())
    }

    fn draw_boxed(&self, out: &mut impl Write) -> std::io::Result<()> {
        let width = usize::from(self.rect.width);
        if width < 2 || self.rect.height < 2 {
            return Ok(());
        }
        let inner = width - 2;

        // Top border with centered caption.
        let caption = if self.caption.is_empty() {
            String::new()
        } else {
            format!(" {} ", self.caption)
        };
        let caption = clip_to_width(&caption, inner);
        let used = display_width(&caption);
        let left = (inner - used) / 2;
        let top = format!(
            "┌{}{}{}┐",
            "─".repeat(left),
            caption,
            "─".repeat(inner - used - left)
        );
        queue!(out, MoveTo(self.rect.x, self.rect.y), Print(top))?;

        let cursor_pos = self.cursor.position();
        for row in 0..self.viewport_lines() {
            let index = self.top_line + row;
            let line = self.lines.get(index).map_or("", |l| l.as_str());
            let clipped = clip_to_width(line, inner.saturating_sub(2));
            let mut rendered = format!(
                " {} ",
                pad_to_width(&clipped, inner.saturating_sub(2))
            );
            if Some(index) == cursor_pos && !self.lines.is_empty() {
                rendered = format!("\x1b[7m{}\x1b[0m", strip_for_cursor(&rendered));
            }
            queue!(
                out,
                MoveTo(self.rect.x, self.rect.y + 1 + row as u16),
                Print(format!("│{rendered}│"))
            )?;
        }

        let bottom = format!("└{}┘", "─".repeat(inner));
        queue!(
            out,
            MoveTo(self.rect.x, self.rect.y + self.rect.height - 1),
            Print(bottom)
        )?;

        Ok(())
    }
}

/// A visible component; concrete windows embed a [`WindowState`] and
/// override input handling where needed.
pub trait Window {
    /// The shared state.
    fn state(&self) -> &WindowState;
    /// The shared state, mutably.
    fn state_mut(&mut self) -> &mut WindowState;

    /// Handles a key; the default is the navigation map.
    fn handle_key(&mut self, key: &str) -> KeyOutcome {
        self.state_mut().default_key(key)
    }

    /// Handles a mouse event.
    fn handle_mouse(&mut self, event: &MouseEvent) -> KeyOutcome {
        self.state_mut().default_mouse(event)
    }

    /// Re-layouts for a new screen size; popups size and center here.
    fn layout(&mut self, _screen_width: u16, _screen_height: u16) {}
}

fn split_lines<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> Vec<String> {
    let mut out = Vec::new();
    for chunk in lines {
        for line in chunk.as_ref().split('\n') {
            out.push(line.to_string());
        }
    }
    out
}

fn pad_to_width(text: &str, width: usize) -> String {
    let used = display_width(text);
    if used >= width {
        return text.to_string();
    }
    let mut out = text.to_string();
    out.push_str(&" ".repeat(width - used));
    out
}

/// Drops color escapes so the reverse-video cursor bar reads uniformly.
fn strip_for_cursor(text: &str) -> String {
    crate::text::strip_ansi(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with_lines(n: usize, height: u16) -> WindowState {
        let mut state = WindowState::new("test");
        state.set_rect(Rect::new(0, 0, 40, height));
        state.set_content((0..n).map(|i| format!("line {i}")));
        state
    }

    #[test]
    fn test_auto_scroll_snaps_to_bottom() {
        let mut state = WindowState::new("log");
        state.set_rect(Rect::new(0, 0, 40, 6));
        state.set_auto_scroll(true);
        state.set_content((0..20).map(|i| format!("l{i}")));
        // 5 viewport rows under the caption.
        assert_eq!(state.top_line(), 15);

        state.add_line("l20");
        assert_eq!(state.top_line(), 16);
    }

    #[test]
    fn test_add_line_splits_newlines() {
        let mut state = WindowState::new("w");
        state.add_line("a\nb\nc");
        assert_eq!(state.line_count(), 3);
    }

    #[test]
    fn test_cursor_keys_scroll_viewport() {
        let mut state = window_with_lines(30, 6);
        state.set_cursor(Cursor::free());

        for _ in 0..10 {
            assert!(matches!(
                state.default_key("down"),
                KeyOutcome::Consumed
            ));
        }
        assert_eq!(state.cursor().position(), Some(10));
        // Cursor stayed visible: top_line follows.
        assert!(state.top_line() >= 10 - state.viewport_lines() + 1);

        state.default_key("home");
        assert_eq!(state.cursor().position(), Some(0));
        assert_eq!(state.top_line(), 0);

        state.default_key("end");
        assert_eq!(state.cursor().position(), Some(29));
    }

    #[test]
    fn test_page_and_half_page_movement() {
        let mut state = window_with_lines(100, 12);
        state.set_cursor(Cursor::free());
        let viewport = state.viewport_lines();

        state.default_key("page_down");
        assert_eq!(state.cursor().position(), Some(viewport));

        state.default_key("ctrl_d");
        assert_eq!(
            state.cursor().position(),
            Some(viewport + viewport / 2)
        );

        state.default_key("page_up");
        state.default_key("ctrl_u");
        assert_eq!(state.cursor().position(), Some(0));
    }

    #[test]
    fn test_keys_ignored_without_cursor() {
        let mut state = window_with_lines(10, 6);
        assert!(matches!(state.default_key("down"), KeyOutcome::Ignored));
        assert!(matches!(state.default_key("q"), KeyOutcome::Ignored));
    }

    #[test]
    fn test_mouse_scroll_moves_by_four() {
        let mut state = window_with_lines(30, 6);
        state.set_cursor(Cursor::free());
        let event = MouseEvent {
            button: MouseButton::ScrollDown,
            column: 0,
            row: 0,
        };
        state.default_mouse(&event);
        assert_eq!(state.cursor().position(), Some(4));
    }

    #[test]
    fn test_mouse_click_selects_line() {
        let mut state = window_with_lines(30, 10);
        state.set_cursor(Cursor::free());
        // Row 0 is the caption; row 3 is content line 2.
        let event = MouseEvent {
            button: MouseButton::Left,
            column: 5,
            row: 3,
        };
        assert!(matches!(state.default_mouse(&event), KeyOutcome::Consumed));
        assert_eq!(state.cursor().position(), Some(2));
    }

    #[test]
    fn test_mouse_click_outside_ignored() {
        let mut state = window_with_lines(30, 10);
        state.set_cursor(Cursor::free());
        let event = MouseEvent {
            button: MouseButton::Left,
            column: 50,
            row: 3,
        };
        assert!(matches!(state.default_mouse(&event), KeyOutcome::Ignored));
    }

    #[test]
    fn test_draw_marks_clean() {
        let mut state = window_with_lines(3, 6);
        assert!(state.dirty());
        let mut buf = Vec::new();
        state.draw(&mut buf).unwrap();
        assert!(!state.dirty());
        assert!(!buf.is_empty());
    }
}
