//! ANSI-aware text measurement and clipping.
//!
//! Window content lines carry color escapes; layout and scrolling must
//! measure only what the terminal will actually render.

use unicode_width::UnicodeWidthChar;

/// Removes CSI escape sequences, keeping printable text.
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'[') {
            chars.next();
            // Consume parameter bytes up to and including the final
            // byte (0x40..=0x7e).
            for c in chars.by_ref() {
                if ('\x40'..='\x7e').contains(&c) {
                    break;
                }
            }
        }
    }

    out
}

/// Printable width in terminal cells, ignoring ANSI escapes.
#[must_use]
pub fn display_width(text: &str) -> usize {
    strip_ansi(text)
        .chars()
        .map(|c| c.width().unwrap_or(0))
        .sum()
}

/// Clips a line to `width` cells, preserving escape sequences and
/// appending a reset if any were present.
#[must_use]
pub fn clip_to_width(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut used = 0usize;
    let mut saw_escape = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            saw_escape = true;
            out.push(c);
            if chars.peek() == Some(&'[') {
                out.push(chars.next().unwrap());
                for c in chars.by_ref() {
                    out.push(c);
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            continue;
        }

        let cell_width = c.width().unwrap_or(0);
        if used + cell_width > width {
            break;
        }
        used += cell_width;
        out.push(c);
    }

    if saw_escape {
        out.push_str("\x1b[0m");
    }
    out
}
