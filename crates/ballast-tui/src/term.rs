//! Terminal setup and teardown.

use std::io::{self, Write};

use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{cursor, execute};

/// X10 mouse reporting; crossterm's own capture negotiates newer
/// protocols the input parser does not speak.
const MOUSE_ON: &str = "\x1b[?1000h";
const MOUSE_OFF: &str = "\x1b[?1000l";

/// RAII guard owning the terminal state: raw mode, alternate screen,
/// hidden cursor, X10 mouse reporting. Everything is restored on drop,
/// panics included.
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    /// Puts the terminal into TUI mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal rejects raw mode.
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
        stdout.write_all(MOUSE_ON.as_bytes())?;
        stdout.flush()?;
        Ok(Self { _private: () })
    }

    /// Current terminal size as (width, height).
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be queried.
    pub fn size() -> io::Result<(u16, u16)> {
        Ok(crossterm::terminal::size()?)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(MOUSE_OFF.as_bytes());
        let _ = execute!(stdout, cursor::Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}
