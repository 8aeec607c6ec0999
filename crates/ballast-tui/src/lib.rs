//! Event-driven TUI runtime.
//!
//! A single cooperative loop thread owns all mutable interface state;
//! producer threads (keyboard, resize bridge, timers) only post events
//! or submit closures onto the [`EventQueue`]. Drawing is a windowed
//! model: tiled windows plus a popup stack, with invalidation-driven
//! repaint coalescing on queue-empty.

mod cursor;
mod error;
mod event;
mod input;
mod popup;
mod queue;
mod screen;
mod term;
pub mod text;
mod window;

pub use cursor::Cursor;
pub use error::{Result, TuiError};
pub use event::{Event, MouseButton, MouseEvent};
pub use input::{run_keyboard_reader, spawn_keyboard_reader, InputParser};
pub use popup::{PickerWindow, PopupWindow};
pub use queue::{EventQueue, HandlerResult, Task};
pub use screen::{window_ref, Screen, WindowRef};
pub use term::TerminalGuard;
pub use window::{KeyOutcome, Rect, Window, WindowState};
