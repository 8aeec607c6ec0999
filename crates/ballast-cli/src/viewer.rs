//! Launches the external graphical viewer.

use std::process::Command;

/// Opens `virt-viewer` for a VM on a detached thread.
///
/// The viewer stays open as long as the user wants it; its exit is
/// logged, never awaited by the loop.
pub fn launch(name: &str) {
    tracing::info!("opening viewer for {name}");
    let name = name.to_string();

    let spawned = std::thread::Builder::new()
        .name("viewer".to_string())
        .spawn(move || {
            match Command::new("virt-viewer").arg(&name).output() {
                Ok(output) if output.status.success() => {
                    tracing::info!("viewer for {name} closed");
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    tracing::error!(
                        "viewer for {name} failed: {}",
                        stderr.trim()
                    );
                }
                Err(err) => {
                    tracing::error!("could not launch viewer: {err}");
                }
            }
        });
    if let Err(err) = spawned {
        tracing::error!("failed to spawn viewer thread: {err}");
    }
}
