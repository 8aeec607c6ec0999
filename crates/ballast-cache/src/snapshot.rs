//! The immutable whole-system view produced by one sampling tick.

use std::collections::HashMap;

use ballast_common::MemoryStat;
use ballast_hostinfo::{CpuSample, DiskUsage};
use ballast_virsh::DomainData;

/// Balloon data older than this many seconds counts as stale.
pub const STALE_AFTER_SEC: u64 = 7;

/// Per-VM record derived from two consecutive samples.
#[derive(Debug, Clone, PartialEq)]
pub struct VMCache {
    /// The current sample.
    pub data: DomainData,
    /// CPU usage since the previous sample; may exceed 100 on
    /// multi-core guests.
    pub cpu_usage_percent: f64,
    /// How far the balloon statistics timestamp advanced since the
    /// previous sample. `None` without balloon data, 0 on first sight.
    pub mem_data_age_sec: Option<u64>,
}

impl VMCache {
    /// Whether the balloon statistics stopped advancing.
    #[must_use]
    pub fn stale(&self) -> bool {
        self.mem_data_age_sec
            .is_some_and(|age| age >= STALE_AFTER_SEC)
    }
}

/// Host counters of one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSample {
    /// Physical memory.
    pub mem: MemoryStat,
    /// Swap space.
    pub swap: MemoryStat,
    /// Aggregate CPU counters.
    pub cpu: CpuSample,
    /// Per-device usage aggregated over all VM images.
    pub disks: HashMap<String, DiskUsage>,
}

/// One immutable whole-system sample.
///
/// Replaced wholesale on every tick and read-only until the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Derived per-VM records, keyed by domain name.
    pub per_vm: HashMap<String, VMCache>,
    /// Host counters.
    pub host: HostSample,
    /// Host CPU usage since the previous tick, two decimals.
    pub host_cpu_percent: f64,
    /// Sum of RSS over running VMs.
    pub total_vm_rss: u64,
    /// Sum of per-VM CPU percents divided by the host CPU count.
    pub total_vm_cpu_percent: f64,
}

/// Derives a [`VMCache`] from the previous and current sample of one
/// domain.
#[must_use]
pub fn diff(prev: Option<&DomainData>, next: &DomainData) -> VMCache {
    let cpu_usage_percent = match prev {
        Some(prev) if next.sampled_at_ms > prev.sampled_at_ms => {
            let interval_ms = next.sampled_at_ms - prev.sampled_at_ms;
            let used_ms = next.cpu_time_ms.saturating_sub(prev.cpu_time_ms);
            used_ms as f64 * 100.0 / interval_ms as f64
        }
        _ => 0.0,
    };

    let mem_data_age_sec = next.mem_stat.map(|next_mem| {
        match prev.and_then(|p| p.mem_stat) {
            // First balloon sighting: fresh, never stale.
            None => 0,
            Some(prev_mem)
                if next_mem.last_updated_sec == prev_mem.last_updated_sec =>
            {
                // The guest stopped refreshing: the data ages against
                // the wall clock until the timestamp moves again.
                (next.sampled_at_ms / 1000)
                    .saturating_sub(next_mem.last_updated_sec)
            }
            Some(prev_mem) => next_mem
                .last_updated_sec
                .saturating_sub(prev_mem.last_updated_sec),
        }
    });

    VMCache {
        data: next.clone(),
        cpu_usage_percent,
        mem_data_age_sec,
    }
}
