//! The `/proc`-backed system information provider.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Command;

use crate::error::{HostInfoError, Result};
use crate::parse::{parse_cpu_flags, parse_cpu_sample, parse_df, parse_meminfo};
use crate::types::{CpuSample, DiskUsage, MemoryStats};

/// Host counter sampling, behind a trait so the sampling cache can be
/// tested against scripted values.
pub trait SystemInfo: Send {
    /// Samples host RAM and swap.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter file is unreadable or malformed.
    fn memory_stats(&self) -> Result<MemoryStats>;

    /// Samples the aggregate CPU counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter file is unreadable or malformed.
    fn cpu_sample(&self) -> Result<CpuSample>;

    /// Resolves each image path to its backing device and aggregates
    /// per-device usage. Empty input yields an empty map without
    /// spawning anything.
    ///
    /// # Errors
    ///
    /// Returns an error if `df` fails or prints unexpected output.
    fn disk_usage(
        &self,
        qcow2: &[(PathBuf, u64)],
    ) -> Result<HashMap<String, DiskUsage>>;

    /// Union of CPU feature flags across all cores.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter file is unreadable.
    fn cpu_flags(&self) -> Result<HashSet<String>>;
}

/// Reads the real `/proc` files and runs `df -P -k`.
#[derive(Debug, Clone)]
pub struct ProcSystemInfo {
    proc_root: PathBuf,
    df_binary: String,
}

impl ProcSystemInfo {
    /// Creates a provider reading from `/proc`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Creates a provider reading from an alternate root (tests).
    #[must_use]
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            df_binary: "df".to_string(),
        }
    }

    fn read(&self, file: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.proc_root.join(file))?)
    }
}

impl Default for ProcSystemInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInfo for ProcSystemInfo {
    fn memory_stats(&self) -> Result<MemoryStats> {
        parse_meminfo(&self.read("meminfo")?)
    }

    fn cpu_sample(&self) -> Result<CpuSample> {
        parse_cpu_sample(&self.read("stat")?)
    }

    fn disk_usage(
        &self,
        qcow2: &[(PathBuf, u64)],
    ) -> Result<HashMap<String, DiskUsage>> {
        if qcow2.is_empty() {
            return Ok(HashMap::new());
        }
        tracing::debug!("resolving {} image paths via df", qcow2.len());

        let mut command = Command::new(&self.df_binary);
        command.arg("-P").arg("-k");
        for (path, _) in qcow2 {
            command.arg(path);
        }

        let output = command.output()?;
        if !output.status.success() {
            return Err(HostInfoError::Command {
                command: format!("{} -P -k ...", self.df_binary),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr)
                    .trim()
                    .to_string(),
            });
        }

        parse_df(&String::from_utf8_lossy(&output.stdout), qcow2)
    }

    fn cpu_flags(&self) -> Result<HashSet<String>> {
        Ok(parse_cpu_flags(&self.read("cpuinfo")?))
    }
}
