//! Log sink: a tracing layer feeding the log window.
//!
//! Library code logs through `tracing` as usual; this layer formats
//! each event into one line and pushes it into a shared buffer. The
//! event loop drains the buffer into the LogWindow before repainting,
//! so records from any thread surface in the TUI without touching
//! interface state off the loop thread. Tests hand the same buffer to
//! assertions instead.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Thread-safe line buffer between producers and the log window.
#[derive(Debug, Default)]
pub struct LogBuffer {
    lines: Mutex<Vec<String>>,
}

impl LogBuffer {
    /// Appends a line.
    pub fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    /// Takes everything buffered so far.
    #[must_use]
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut self.lines.lock().unwrap())
    }
}

/// Formats tracing events into the buffer.
pub struct WindowLayer {
    buffer: Arc<LogBuffer>,
}

impl WindowLayer {
    /// Creates a layer writing into `buffer`.
    #[must_use]
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self { buffer }
    }
}

impl<S: Subscriber> Layer<S> for WindowLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageVisitor::default();
        event.record(&mut message);

        let line = format!(
            "{} {:<5} {}",
            chrono::Local::now().format("%H:%M:%S"),
            event.metadata().level(),
            message.text
        );
        self.buffer.push(line);
    }
}

#[derive(Default)]
struct MessageVisitor {
    text: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.text, "{value:?}");
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.text.push_str(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_events_land_in_buffer() {
        let buffer = Arc::new(LogBuffer::default());
        let subscriber = tracing_subscriber::registry()
            .with(WindowLayer::new(buffer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("hello from the test");
            tracing::error!("and a failure");
        });

        let lines = buffer.drain();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("hello from the test"));
        assert!(lines[1].contains("ERROR"));
        assert!(buffer.drain().is_empty());
    }
}
