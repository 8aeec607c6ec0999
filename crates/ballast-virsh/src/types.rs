//! Typed records produced by the hypervisor adapter.
//!
//! All byte fields are base-1024 bytes and all time fields are
//! milliseconds or seconds; the KiB and nanosecond figures libvirt
//! reports are converted at the parsing boundary.

use std::path::PathBuf;

use ballast_common::MemoryStat;

/// Lifecycle state of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    /// The domain is running.
    Running,
    /// The domain is defined but powered off.
    ShutOff,
    /// The domain is suspended.
    Paused,
    /// Any other libvirt state (blocked, crashed, pmsuspended, ...).
    Other,
}

impl DomainState {
    /// Maps libvirt's `state.state` integer to a state.
    #[must_use]
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => Self::Running,
            3 => Self::Paused,
            5 => Self::ShutOff,
            _ => Self::Other,
        }
    }

    /// Short lowercase label for display.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::ShutOff => "shut off",
            Self::Paused => "paused",
            Self::Other => "other",
        }
    }
}

/// Static description of a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    /// Domain name as known to libvirt.
    pub name: String,
    /// Maximum number of vCPUs.
    pub cpus: u64,
    /// Maximum memory the domain may ever be ballooned to, in bytes.
    pub max_memory: u64,
}

/// Balloon statistics reported by the in-guest driver.
///
/// Present only when the guest runs the stats-capable VirtIO balloon
/// driver; all four fields arrive together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestMemStat {
    /// Bytes the guest considers unused.
    pub unused: u64,
    /// Total memory visible to the guest.
    pub available: u64,
    /// Bytes the guest could reclaim without swapping.
    pub usable: u64,
    /// Bytes used for disk caches inside the guest.
    pub disk_caches: u64,
}

/// Memory statistics of a running domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemStat {
    /// Current balloon size in bytes (`balloon.current`).
    pub actual: u64,
    /// Resident set size of the hypervisor process for this domain.
    pub rss: u64,
    /// Hypervisor timestamp of the last balloon stats refresh, in
    /// seconds. Identical values across samples signal staleness.
    pub last_updated_sec: u64,
    /// In-guest statistics, when the balloon driver reports them.
    pub guest: Option<GuestMemStat>,
}

impl MemStat {
    /// Guest memory pressure as a total/available pair.
    ///
    /// `None` when the guest driver reports no statistics, in which case
    /// ballooning is unsupported for this domain.
    #[must_use]
    pub fn guest_mem(&self) -> Option<MemoryStat> {
        self.guest
            .map(|g| MemoryStat::new(g.available, g.usable))
    }
}

/// One block device of a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskStat {
    /// Guest-side device name ("vda").
    pub name: String,
    /// Bytes allocated from the guest's point of view.
    pub allocation: u64,
    /// Guest-visible capacity in bytes.
    pub capacity: u64,
    /// Bytes the image occupies on the host.
    pub physical: u64,
    /// Host path of the backing image, when libvirt reports one.
    pub path: Option<PathBuf>,
}

impl DiskStat {
    /// How much larger (+) or smaller (−) the on-host image is than the
    /// guest-visible allocation, as a percentage clamped to [−100, 999].
    #[must_use]
    pub fn overhead_percent(&self) -> i32 {
        if self.allocation == 0 {
            return 0;
        }
        let percent =
            (self.physical as f64 / self.allocation as f64 - 1.0) * 100.0;
        percent.round().clamp(-100.0, 999.0) as i32
    }
}

/// Everything the adapter knows about one domain after one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainData {
    /// Static domain description.
    pub info: DomainInfo,
    /// Lifecycle state at sampling time.
    pub state: DomainState,
    /// Host wall-clock time of the sample, in milliseconds since epoch.
    pub sampled_at_ms: u64,
    /// Cumulative CPU time consumed by the domain, in milliseconds.
    pub cpu_time_ms: u64,
    /// Memory statistics; present exactly when the domain is running.
    pub mem_stat: Option<MemStat>,
    /// Block devices in report order.
    pub disks: Vec<DiskStat>,
}

impl DomainData {
    /// Whether the domain is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == DomainState::Running
    }

    /// qcow2 paths with their on-host sizes, for disk aggregation.
    #[must_use]
    pub fn disk_paths(&self) -> Vec<(PathBuf, u64)> {
        self.disks
            .iter()
            .filter_map(|d| d.path.clone().map(|p| (p, d.physical)))
            .collect()
    }
}

/// Host CPU topology as reported by `virsh nodeinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCpuInfo {
    /// CPU model string.
    pub model: String,
    /// Number of CPU sockets.
    pub sockets: u64,
    /// Cores per socket.
    pub cores_per_socket: u64,
    /// Threads per core.
    pub threads_per_core: u64,
}

impl HostCpuInfo {
    /// Total logical CPUs.
    #[must_use]
    pub fn cpus(&self) -> u64 {
        self.sockets * self.cores_per_socket * self.threads_per_core
    }
}
