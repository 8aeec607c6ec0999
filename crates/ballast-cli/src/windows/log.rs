//! The log window: tails the injected log sink.

use ballast_tui::{Cursor, Window, WindowState};

use crate::fmt;

/// Scrolling view over everything the process has logged.
pub struct LogWindow {
    state: WindowState,
}

impl LogWindow {
    /// Creates an auto-scrolling log window.
    #[must_use]
    pub fn new() -> Self {
        let mut state = WindowState::new("Log");
        state.set_auto_scroll(true);
        state.set_cursor(Cursor::free());
        state.set_hint("up/down:scroll");
        Self { state }
    }

    /// Appends drained sink lines, coloring by level.
    pub fn append(&mut self, lines: Vec<String>) {
        self.state.add_lines(lines.iter().map(|line| {
            if line.contains(" ERROR ") {
                fmt::red(line)
            } else if line.contains(" WARN ") {
                fmt::yellow(line)
            } else {
                line.clone()
            }
        }));
    }
}

impl Default for LogWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl Window for LogWindow {
    fn state(&self) -> &WindowState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut WindowState {
        &mut self.state
    }
}
