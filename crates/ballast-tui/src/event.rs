//! Events flowing through the queue.

/// Mouse button or wheel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    /// Left button press.
    Left,
    /// Middle button press.
    Middle,
    /// Right button press.
    Right,
    /// Wheel up.
    ScrollUp,
    /// Wheel down.
    ScrollDown,
    /// Anything else the terminal reports.
    Other(u8),
}

impl MouseButton {
    /// Decodes the X10 button code (already de-biased by 32).
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Left,
            1 => Self::Middle,
            2 => Self::Right,
            64 => Self::ScrollUp,
            65 => Self::ScrollDown,
            other => Self::Other(other),
        }
    }
}

/// A mouse press or wheel event, with 0-based screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// Which button.
    pub button: MouseButton,
    /// Column, 0-based.
    pub column: u16,
    /// Row, 0-based.
    pub row: u16,
}

/// One item delivered to the event-loop handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A key, named ("up", "page_down", "enter", "esc", "ctrl_u") or a
    /// single printable character ("q").
    Key(String),
    /// A mouse press or wheel event.
    Mouse(MouseEvent),
    /// The terminal was resized.
    Resize {
        /// New width in columns.
        width: u16,
        /// New height in rows.
        height: u16,
    },
    /// Delivered once whenever the loop is about to block on an empty
    /// queue; the repaint hook.
    QueueEmpty,
    /// A producer thread failed; terminates the loop.
    Error(String),
}
