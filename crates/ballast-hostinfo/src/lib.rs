//! Host resource sampling.
//!
//! Reads the kernel's memory, CPU and CPU-feature counters from
//! `/proc` and resolves VM image paths to their backing block devices
//! through a POSIX `df -P -k` invocation. The parsers are pure
//! functions; the [`SystemInfo`] trait is the seam the sampling cache
//! programs against.

mod error;
mod parse;
mod provider;
mod types;

pub use error::{HostInfoError, Result};
pub use parse::{cpu_percent, parse_cpu_flags, parse_cpu_sample, parse_df, parse_meminfo};
pub use provider::{ProcSystemInfo, SystemInfo};
pub use types::{CpuSample, DiskUsage, MemoryStats};
