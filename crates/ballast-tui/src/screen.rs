//! The screen: tiled windows, popup stack, coalesced repaint.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use crate::event::MouseEvent;
use crate::text::clip_to_width;
use crate::window::{KeyOutcome, Window};

/// Shared window handle; the screen owns the stacking, the application
/// keeps typed handles to push content.
pub type WindowRef = Rc<RefCell<dyn Window>>;

/// Wraps a concrete window into a [`WindowRef`].
pub fn window_ref<W: Window + 'static>(window: W) -> Rc<RefCell<W>> {
    Rc::new(RefCell::new(window))
}

struct TiledEntry {
    shortcut: char,
    window: WindowRef,
}

/// Layout tree: an ordered set of tiled windows (one active) plus a
/// LIFO stack of popups, the topmost of which receives input.
///
/// Only the event-loop thread can reach a `Screen` (it lives inside
/// the loop context), so every mutation is serialized by construction.
pub struct Screen {
    tiled: Vec<TiledEntry>,
    active: usize,
    popups: Vec<WindowRef>,
    width: u16,
    height: u16,
    full_repaint: bool,
    status: String,
    status_dirty: bool,
}

impl Screen {
    /// Creates an empty screen of the given size.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            tiled: Vec::new(),
            active: 0,
            popups: Vec::new(),
            width,
            height,
            full_repaint: true,
            status: String::new(),
            status_dirty: true,
        }
    }

    /// Current size.
    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Adds a tiled window under a shortcut key; the first one becomes
    /// active.
    pub fn add_tiled(&mut self, shortcut: char, window: WindowRef) {
        let first = self.tiled.is_empty();
        if first {
            window.borrow_mut().state_mut().set_active(true);
        }
        self.tiled.push(TiledEntry { shortcut, window });
    }

    /// The active tiled window.
    #[must_use]
    pub fn active_window(&self) -> Option<WindowRef> {
        self.tiled.get(self.active).map(|e| e.window.clone())
    }

    /// Activates the tiled window registered under `shortcut`.
    pub fn activate(&mut self, shortcut: char) -> bool {
        let Some(index) =
            self.tiled.iter().position(|e| e.shortcut == shortcut)
        else {
            return false;
        };
        if index != self.active {
            if let Some(old) = self.tiled.get(self.active) {
                old.window.borrow_mut().state_mut().set_active(false);
            }
            self.tiled[index]
                .window
                .borrow_mut()
                .state_mut()
                .set_active(true);
            self.active = index;
            self.status_dirty = true;
        }
        true
    }

    /// Pushes a popup on top of the stack, laying it out for the
    /// current size.
    pub fn add_popup(&mut self, popup: WindowRef) {
        popup.borrow_mut().layout(self.width, self.height);
        popup.borrow_mut().state_mut().invalidate();
        self.popups.push(popup);
    }

    /// Removes a window from the popup stack. Uncovering what was
    /// beneath needs a full repaint.
    pub fn remove_window(&mut self, window: &WindowRef) {
        let before = self.popups.len();
        self.popups.retain(|p| !Rc::ptr_eq(p, window));
        if self.popups.len() != before {
            self.full_repaint = true;
        }
    }

    /// Whether any popup is open.
    #[must_use]
    pub fn has_popup(&self) -> bool {
        !self.popups.is_empty()
    }

    /// Applies a new terminal size: recenter popups, full repaint.
    /// Tiled rects are the application's relayout concern.
    pub fn layout(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        for popup in &self.popups {
            popup.borrow_mut().layout(width, height);
        }
        self.full_repaint = true;
    }

    /// Sets the status-bar text (bottom row).
    pub fn set_status(&mut self, status: impl Into<String>) {
        let status = status.into();
        if status != self.status {
            self.status = status;
            self.status_dirty = true;
        }
    }

    /// Routes a key: topmost popup first, then shortcuts, then the
    /// active tiled window. Returns whether it was consumed.
    pub fn handle_key(&mut self, key: &str) -> bool {
        if let Some(top) = self.popups.last().cloned() {
            let outcome = top.borrow_mut().handle_key(key);
            self.apply_outcome(outcome, &top);
            // Popups are modal.
            return true;
        }

        if key.chars().count() == 1 {
            let c = key.chars().next().unwrap();
            if self.tiled.iter().any(|e| e.shortcut == c) {
                self.activate(c);
                return true;
            }
        }

        if let Some(active) = self.active_window() {
            let outcome = active.borrow_mut().handle_key(key);
            return self.apply_outcome(outcome, &active);
        }
        false
    }

    /// Routes a mouse event: topmost popup, else the tiled window
    /// under the pointer.
    pub fn handle_mouse(&mut self, event: &MouseEvent) -> bool {
        if let Some(top) = self.popups.last().cloned() {
            let outcome = top.borrow_mut().handle_mouse(event);
            self.apply_outcome(outcome, &top);
            return true;
        }

        let target = self
            .tiled
            .iter()
            .map(|e| e.window.clone())
            .find(|w| {
                w.borrow().state().rect().contains(event.column, event.row)
            });
        if let Some(target) = target {
            let outcome = target.borrow_mut().handle_mouse(event);
            return self.apply_outcome(outcome, &target);
        }
        false
    }

    fn apply_outcome(&mut self, outcome: KeyOutcome, window: &WindowRef) -> bool {
        match outcome {
            KeyOutcome::Ignored => false,
            KeyOutcome::Consumed => true,
            KeyOutcome::Close => {
                self.remove_window(window);
                true
            }
            KeyOutcome::Popup(popup) => {
                self.add_popup(popup);
                true
            }
        }
    }

    /// Repaints what changed.
    ///
    /// A full repaint (resize, popup removal) redraws everything in
    /// stacking order. Otherwise dirty tiled windows repaint, and
    /// popups repaint either all (when any tiled window repainted
    /// underneath them) or just the dirty ones. Over-drawing is
    /// accepted in place of clipping.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the terminal fails.
    pub fn repaint(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        let full = self.full_repaint;
        if full {
            queue!(out, Clear(ClearType::All))?;
        }

        let mut any_tiled = false;
        for entry in &self.tiled {
            let mut window = entry.window.borrow_mut();
            if full || window.state().dirty() {
                window.state_mut().draw(out)?;
                any_tiled = true;
            }
        }

        for popup in &self.popups {
            let mut popup = popup.borrow_mut();
            if full || any_tiled || popup.state().dirty() {
                popup.state_mut().draw(out)?;
            }
        }

        if full || self.status_dirty {
            self.draw_status(out)?;
        }

        self.full_repaint = false;
        self.status_dirty = false;
        out.flush()
    }

    fn draw_status(&self, out: &mut impl Write) -> std::io::Result<()> {
        if self.height == 0 {
            return Ok(());
        }
        let width = usize::from(self.width);
        let clipped = clip_to_width(&self.status, width);
        let padding =
            " ".repeat(width.saturating_sub(crate::text::display_width(&clipped)));
        queue!(
            out,
            MoveTo(0, self.height - 1),
            Print(format!("{clipped}{padding}"))
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{Rect, WindowState};

    struct Plain {
        state: WindowState,
    }

    impl Plain {
        fn new(caption: &str) -> Self {
            let mut state = WindowState::new(caption);
            state.set_rect(Rect::new(0, 0, 20, 5));
            state.set_content(["one", "two", "three"]);
            state.set_cursor(crate::cursor::Cursor::free());
            Self { state }
        }
    }

    impl Window for Plain {
        fn state(&self) -> &WindowState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut WindowState {
            &mut self.state
        }
    }

    fn screen_with_two() -> (Screen, Rc<RefCell<Plain>>, Rc<RefCell<Plain>>) {
        let mut screen = Screen::new(80, 24);
        let a = window_ref(Plain::new("a"));
        let b = window_ref(Plain::new("b"));
        screen.add_tiled('1', a.clone());
        screen.add_tiled('2', b.clone());
        (screen, a, b)
    }

    #[test]
    fn test_first_tiled_window_is_active() {
        let (screen, a, b) = screen_with_two();
        assert!(a.borrow().state().active());
        assert!(!b.borrow().state().active());

        let a_dyn: WindowRef = a;
        assert!(Rc::ptr_eq(&screen.active_window().unwrap(), &a_dyn));
    }

    #[test]
    fn test_shortcut_switches_active_window() {
        let (mut screen, a, b) = screen_with_two();
        assert!(screen.handle_key("2"));
        assert!(!a.borrow().state().active());
        assert!(b.borrow().state().active());
    }

    #[test]
    fn test_keys_route_to_active_window() {
        let (mut screen, a, _b) = screen_with_two();
        assert!(screen.handle_key("down"));
        assert_eq!(a.borrow().state().cursor().position(), Some(1));
    }

    #[test]
    fn test_unhandled_key_not_consumed() {
        let (mut screen, _a, _b) = screen_with_two();
        assert!(!screen.handle_key("z"));
    }

    #[test]
    fn test_topmost_popup_receives_input_and_closes() {
        let (mut screen, a, _b) = screen_with_two();
        let popup = window_ref(crate::popup::PopupWindow::new("p", 10));
        screen.add_popup(popup.clone());
        popup.borrow_mut().set_content(["hello"]);

        // Keys go to the popup, not the tiled window.
        assert!(screen.handle_key("down"));
        assert_eq!(a.borrow().state().cursor().position(), Some(0));

        assert!(screen.handle_key("q"));
        assert!(!screen.has_popup());
    }

    #[test]
    fn test_popup_removal_triggers_full_repaint() {
        let (mut screen, _a, _b) = screen_with_two();
        let mut buf = Vec::new();
        screen.repaint(&mut buf).unwrap();

        let popup = window_ref(crate::popup::PopupWindow::new("p", 10));
        screen.add_popup(popup.clone());
        screen.handle_key("esc");
        assert!(!screen.has_popup());

        // The uncovered area forces everything to redraw.
        let mut buf = Vec::new();
        screen.repaint(&mut buf).unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("one"));
    }

    #[test]
    fn test_repaint_skips_clean_windows() {
        let (mut screen, a, _b) = screen_with_two();
        let mut buf = Vec::new();
        screen.repaint(&mut buf).unwrap();

        // Nothing dirty: nothing but the flush.
        let mut buf = Vec::new();
        screen.repaint(&mut buf).unwrap();
        assert!(buf.is_empty());

        a.borrow_mut().state_mut().invalidate();
        let mut buf = Vec::new();
        screen.repaint(&mut buf).unwrap();
        assert!(!buf.is_empty());
    }

    #[test]
    fn test_mouse_routed_by_containment() {
        let (mut screen, _a, b) = screen_with_two();
        b.borrow_mut().state_mut().set_rect(Rect::new(40, 0, 20, 5));

        let event = MouseEvent {
            button: crate::event::MouseButton::Left,
            column: 45,
            row: 2,
        };
        assert!(screen.handle_mouse(&event));
        assert_eq!(b.borrow().state().cursor().position(), Some(1));
    }

    #[test]
    fn test_activate_unknown_shortcut() {
        let (mut screen, a, _b) = screen_with_two();
        assert!(!screen.activate('9'));
        assert!(a.borrow().state().active());
    }

    #[test]
    fn test_layout_recenters_popups() {
        let (mut screen, _a, _b) = screen_with_two();
        let popup = window_ref(crate::popup::PopupWindow::new("p", 10));
        screen.add_popup(popup.clone());
        popup.borrow_mut().set_content(["hello"]);
        let before = popup.borrow().state().rect();

        screen.layout(120, 50);
        let after = popup.borrow().state().rect();
        assert_ne!(before.x, after.x);
        assert_eq!(after.x, (120 - after.width) / 2);
    }

    #[test]
    fn test_status_repaints_on_change() {
        let (mut screen, _a, _b) = screen_with_two();
        let mut buf = Vec::new();
        screen.repaint(&mut buf).unwrap();

        screen.set_status("q:quit");
        let mut buf = Vec::new();
        screen.repaint(&mut buf).unwrap();
        assert!(String::from_utf8_lossy(&buf).contains("q:quit"));
    }
}
