//! SIGWINCH bridge via the self-pipe pattern.
//!
//! The signal handler performs exactly one async-signal-safe
//! operation: writing a byte into a pipe. A plain thread reads the
//! other end, queries the new terminal size and posts a resize event.
//! No lock is ever touched from signal context.

use std::fs::File;
use std::io::Read;
use std::os::fd::IntoRawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Weak};

use anyhow::Context as _;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use ballast_tui::{Event, EventQueue, TerminalGuard};

static PIPE_WR: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_sigwinch(_: libc::c_int) {
    let fd = PIPE_WR.load(Ordering::Relaxed);
    if fd >= 0 {
        // SAFETY: write(2) on a valid fd is async-signal-safe.
        unsafe {
            libc::write(fd, [b'w'].as_ptr().cast(), 1);
        }
    }
}

/// Installs the SIGWINCH handler and spawns the pipe-reader thread.
///
/// # Errors
///
/// Returns an error if the pipe or the signal handler cannot be set
/// up.
pub fn spawn_resize_bridge<C: 'static>(
    queue: &Arc<EventQueue<C>>,
) -> anyhow::Result<()> {
    let (read_end, write_end) =
        nix::unistd::pipe().context("creating self-pipe")?;
    // The write end lives for the rest of the process; the handler
    // reaches it through the atomic.
    PIPE_WR.store(write_end.into_raw_fd(), Ordering::Relaxed);

    let action = SigAction::new(
        SigHandler::Handler(on_sigwinch),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only writes one byte to a pipe.
    unsafe {
        signal::sigaction(Signal::SIGWINCH, &action)
            .context("installing SIGWINCH handler")?;
    }

    let queue = Arc::downgrade(queue);
    std::thread::Builder::new()
        .name("resize-bridge".to_string())
        .spawn(move || run_bridge(File::from(read_end), &queue))
        .context("spawning resize bridge")?;
    Ok(())
}

fn run_bridge<C>(mut pipe: File, queue: &Weak<EventQueue<C>>) {
    let mut buf = [0u8; 1];
    loop {
        match pipe.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let Some(queue) = queue.upgrade() else {
            return;
        };
        if queue.is_stopped() {
            return;
        }
        match TerminalGuard::size() {
            Ok((width, height)) => {
                queue.post(Event::Resize { width, height });
            }
            Err(err) => tracing::warn!("terminal size query failed: {err}"),
        }
    }
}
