//! Raw-mode input parsing.
//!
//! The keyboard reader thread feeds single bytes into [`InputParser`],
//! which assembles the escape-sequence grammar: cursor and paging keys
//! as CSI sequences, bare Esc, control bytes, and X10 mouse reports
//! (`ESC [ M` followed by button, column and row, each biased by 32).
//!
//! A bare Esc is indistinguishable from the start of a sequence until
//! either another byte arrives or a short poll times out; the reader
//! calls [`InputParser::flush`] in the latter case.

use std::io::Read;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Weak};

use crate::event::{Event, MouseButton, MouseEvent};
use crate::queue::EventQueue;

/// How long the reader waits for the rest of an escape sequence.
const ESCAPE_TIMEOUT_MS: i32 = 50;

#[derive(Debug, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi(Vec<u8>),
    Mouse(Vec<u8>),
}

/// Byte-stream state machine producing [`Event`]s.
#[derive(Debug)]
pub struct InputParser {
    state: State,
}

impl Default for InputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InputParser {
    /// Creates a parser in the ground state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Ground,
        }
    }

    /// Whether the parser sits mid-sequence and wants more bytes.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.state != State::Ground
    }

    /// Resolves a pending sequence on timeout: a lone `0x1b` becomes
    /// the Esc key, anything else is dropped as garbage.
    pub fn flush(&mut self) -> Option<Event> {
        let state = std::mem::replace(&mut self.state, State::Ground);
        match state {
            State::Escape => Some(Event::Key("esc".to_string())),
            _ => None,
        }
    }

    /// Feeds one byte, possibly completing an event.
    pub fn feed(&mut self, byte: u8) -> Option<Event> {
        match std::mem::replace(&mut self.state, State::Ground) {
            State::Ground => self.feed_ground(byte),
            State::Escape => {
                if byte == b'[' {
                    self.state = State::Csi(Vec::new());
                    None
                } else {
                    // Escape followed by something else; the escape is
                    // dropped and the byte starts over.
                    self.feed_ground(byte)
                }
            }
            State::Csi(params) => self.feed_csi(params, byte),
            State::Mouse(bytes) => self.feed_mouse(bytes, byte),
        }
    }

    fn feed_ground(&mut self, byte: u8) -> Option<Event> {
        let key = match byte {
            0x1b => {
                self.state = State::Escape;
                return None;
            }
            0x0d => "enter".to_string(),
            0x15 => "ctrl_u".to_string(),
            0x04 => "ctrl_d".to_string(),
            0x20..=0x7e => (byte as char).to_string(),
            _ => return None,
        };
        Some(Event::Key(key))
    }

    fn feed_csi(&mut self, mut params: Vec<u8>, byte: u8) -> Option<Event> {
        if params.is_empty() && byte == b'M' {
            self.state = State::Mouse(Vec::new());
            return None;
        }

        let key = match byte {
            b'A' => "up",
            b'B' => "down",
            b'C' => "right",
            b'D' => "left",
            b'H' => "home",
            b'F' => "end",
            b'~' => match params.as_slice() {
                b"5" => "page_up",
                b"6" => "page_down",
                _ => return None,
            },
            0x40..=0x7e => return None,
            _ => {
                params.push(byte);
                self.state = State::Csi(params);
                return None;
            }
        };
        Some(Event::Key(key.to_string()))
    }

    fn feed_mouse(&mut self, mut bytes: Vec<u8>, byte: u8) -> Option<Event> {
        bytes.push(byte);
        if bytes.len() < 3 {
            self.state = State::Mouse(bytes);
            return None;
        }

        // Button, column and row are each biased by 32; coordinates are
        // additionally 1-based on the wire and 0-based here.
        let button = MouseButton::from_code(bytes[0].wrapping_sub(32));
        let column = u16::from(bytes[1].saturating_sub(33));
        let row = u16::from(bytes[2].saturating_sub(33));
        Some(Event::Mouse(MouseEvent {
            button,
            column,
            row,
        }))
    }
}

fn byte_ready(fd: RawFd, timeout_ms: i32) -> bool {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: pfd points at a valid pollfd for the duration of the call.
    unsafe { libc::poll(&mut pfd, 1, timeout_ms) > 0 }
}

/// Runs the blocking keyboard reader until the queue goes away.
///
/// Reads stdin byte-wise in raw mode, posting parsed events. There is
/// no cooperative cancellation: the thread dies with the process once
/// the loop has stopped. Read failures are posted as [`Event::Error`].
pub fn run_keyboard_reader<C>(queue: &Weak<EventQueue<C>>) {
    let mut parser = InputParser::new();
    let mut stdin = std::io::stdin();
    let mut buf = [0u8; 1];

    let post = |event: Event| -> bool {
        match queue.upgrade() {
            Some(queue) if !queue.is_stopped() => {
                queue.post(event);
                true
            }
            _ => false,
        }
    };

    loop {
        match stdin.read(&mut buf) {
            Ok(0) => {
                post(Event::Error("stdin closed".to_string()));
                return;
            }
            Ok(_) => {
                if let Some(event) = parser.feed(buf[0]) {
                    if !post(event) {
                        return;
                    }
                }
                // Disambiguate a bare Esc from a sequence prefix.
                while parser.has_pending() {
                    if byte_ready(libc::STDIN_FILENO, ESCAPE_TIMEOUT_MS) {
                        if stdin.read(&mut buf).map_or(true, |n| n == 0) {
                            break;
                        }
                        if let Some(event) = parser.feed(buf[0]) {
                            if !post(event) {
                                return;
                            }
                        }
                    } else if let Some(event) = parser.flush() {
                        if !post(event) {
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                post(Event::Error(format!("keyboard read failed: {err}")));
                return;
            }
        }
    }
}

/// Spawns the keyboard reader thread.
#[must_use]
pub fn spawn_keyboard_reader<C: 'static>(
    queue: &Arc<EventQueue<C>>,
) -> std::thread::JoinHandle<()> {
    let queue = Arc::downgrade(queue);
    std::thread::Builder::new()
        .name("keyboard".to_string())
        .spawn(move || run_keyboard_reader(&queue))
        .expect("failed to spawn keyboard reader")
}
