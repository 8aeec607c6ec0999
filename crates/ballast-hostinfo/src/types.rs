//! Host sampling value records.

use std::path::PathBuf;

use ballast_common::MemoryStat;

/// Host RAM and swap, one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Physical memory.
    pub ram: MemoryStat,
    /// Swap space.
    pub swap: MemoryStat,
}

/// One reading of the aggregate CPU counters from `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuSample {
    /// All clock ticks since boot.
    pub total_clocks: u64,
    /// Idle ticks (idle + iowait).
    pub idle_clocks: u64,
}

/// Usage of one host block device, aggregated over the VM images it
/// backs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskUsage {
    /// Filesystem capacity and free space.
    pub usage: MemoryStat,
    /// Bytes occupied by VM images on this device.
    pub vm_bytes: u64,
    /// The image paths living on this device, in first-seen order.
    pub qcow2_paths: Vec<PathBuf>,
}
