//! The `virsh`-backed hypervisor adapter.

use std::collections::HashMap;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use ballast_common::units::{bytes_to_kib, MIB};
use ballast_common::format_size;

use crate::error::{Result, VirshError};
use crate::parse::{parse_domstats, parse_nodeinfo};
use crate::types::{DomainData, HostCpuInfo};

/// Smallest memory size `set_memory` will hand to the hypervisor.
///
/// Guests wedge hard below this; the controller's own floor sits far
/// above it.
pub const MIN_SET_MEMORY: u64 = 256 * MIB;

/// The adapter surface the rest of the system programs against.
///
/// The sampling cache, the ballooning controller and the VM window all
/// take this trait so tests can substitute a recording fake.
pub trait Hypervisor: Send + Sync {
    /// Samples statistics for all defined domains.
    ///
    /// # Errors
    ///
    /// Returns an error if the subprocess fails or its output is
    /// malformed.
    fn domain_data(&self) -> Result<HashMap<String, DomainData>>;

    /// Reads the host CPU topology.
    ///
    /// # Errors
    ///
    /// Returns an error if the subprocess fails or its output is
    /// malformed.
    fn host_info(&self) -> Result<HostCpuInfo>;

    /// Starts a domain. Asynchronous: runs on an ad-hoc thread and logs
    /// the outcome, since booting can take several seconds.
    fn start(&self, name: &str);

    /// Gracefully shuts a domain down. Asynchronous like [`start`].
    ///
    /// [`start`]: Hypervisor::start
    fn shutdown(&self, name: &str);

    /// Reboots a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the subprocess exits non-zero.
    fn reboot(&self, name: &str) -> Result<()>;

    /// Hard-resets a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the subprocess exits non-zero.
    fn reset(&self, name: &str) -> Result<()>;

    /// Resizes a running domain's balloon to `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`VirshError::InvalidArgument`] for sizes below
    /// [`MIN_SET_MEMORY`], or [`VirshError::Command`] when the
    /// subprocess exits non-zero.
    fn set_memory(&self, name: &str, bytes: u64) -> Result<()>;
}

/// Runs the real `virsh` binary.
#[derive(Debug, Clone)]
pub struct VirshAdapter {
    binary: String,
}

impl VirshAdapter {
    /// Creates an adapter invoking `virsh` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_binary("virsh")
    }

    /// Creates an adapter invoking the given binary.
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Runs `virsh` with the given arguments and returns stdout.
    ///
    /// Domain names travel as discrete argv elements; nothing is ever
    /// interpolated into a shell string.
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary).args(args).output()?;

        if !output.status.success() {
            return Err(VirshError::Command {
                command: format!("{} {}", self.binary, args.join(" ")),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr)
                    .trim()
                    .to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Runs a lifecycle verb on a background thread, logging the outcome.
    fn run_detached(&self, verb: &'static str, name: &str) {
        let adapter = self.clone();
        let name = name.to_string();
        let spawned = std::thread::Builder::new()
            .name(format!("virsh-{verb}"))
            .spawn(move || match adapter.run(&[verb, &name]) {
                Ok(_) => tracing::info!("{verb} {name}: done"),
                Err(err) => tracing::error!("{verb} {name}: {err}"),
            });
        if let Err(err) = spawned {
            tracing::error!("failed to spawn {verb} thread: {err}");
        }
    }
}

impl Default for VirshAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Hypervisor for VirshAdapter {
    fn domain_data(&self) -> Result<HashMap<String, DomainData>> {
        let sampled_at_ms = epoch_ms();
        let output = self.run(&["domstats", "--raw"])?;
        parse_domstats(&output, sampled_at_ms)
    }

    fn host_info(&self) -> Result<HostCpuInfo> {
        let output = self.run(&["nodeinfo"])?;
        parse_nodeinfo(&output)
    }

    fn start(&self, name: &str) {
        self.run_detached("start", name);
    }

    fn shutdown(&self, name: &str) {
        self.run_detached("shutdown", name);
    }

    fn reboot(&self, name: &str) -> Result<()> {
        self.run(&["reboot", name]).map(drop)
    }

    fn reset(&self, name: &str) -> Result<()> {
        self.run(&["reset", name]).map(drop)
    }

    fn set_memory(&self, name: &str, bytes: u64) -> Result<()> {
        if bytes < MIN_SET_MEMORY {
            return Err(VirshError::InvalidArgument(format!(
                "refusing to set memory of {name} below {}",
                format_size(MIN_SET_MEMORY)
            )));
        }

        let kib = bytes_to_kib(bytes);
        tracing::info!("setting memory of {name} to {}", format_size(bytes));
        self.run(&["setmem", name, &kib.to_string(), "--live"])
            .map(drop)
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
