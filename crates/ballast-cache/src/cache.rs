//! The sampling cache.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use ballast_common::format_size;
use ballast_common::units::MIB;
use ballast_hostinfo::{cpu_percent, SystemInfo};
use ballast_virsh::{DomainInfo, DomainState, HostCpuInfo, Hypervisor, MemStat};

use crate::error::{CacheError, Result};
use crate::snapshot::{diff, HostSample, Snapshot, VMCache};

/// Lower bound the cache accepts for a balloon resize.
pub const MIN_VM_MEMORY: u64 = 128 * MIB;

/// Owns the current [`Snapshot`] and replaces it wholesale on every
/// tick.
///
/// Readers (windows, the ballooning controller) observe the snapshot
/// between ticks; nothing in it mutates until the next `update`.
pub struct SamplingCache {
    hypervisor: Arc<dyn Hypervisor>,
    sysinfo: Box<dyn SystemInfo>,
    host_cpu_info: HostCpuInfo,
    virt_flags: HashSet<String>,
    snapshot: Snapshot,
    initialized: bool,
}

impl SamplingCache {
    /// Creates a cache; reads the host topology and CPU flags once.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial `nodeinfo` or `/proc/cpuinfo`
    /// read fails.
    pub fn new(
        hypervisor: Arc<dyn Hypervisor>,
        sysinfo: Box<dyn SystemInfo>,
    ) -> Result<Self> {
        let host_cpu_info = hypervisor.host_info()?;
        let virt_flags: HashSet<String> = sysinfo
            .cpu_flags()?
            .into_iter()
            .filter(|f| f == "vmx" || f == "svm")
            .collect();

        Ok(Self {
            hypervisor,
            sysinfo,
            host_cpu_info,
            virt_flags,
            snapshot: Snapshot::default(),
            initialized: false,
        })
    }

    /// Refreshes the snapshot from the hypervisor and the host
    /// counters.
    ///
    /// # Errors
    ///
    /// Returns an error when sampling fails; the previous snapshot
    /// stays in place and the next tick retries.
    pub fn update(&mut self) -> Result<()> {
        let current = self.hypervisor.domain_data()?;
        let mem = self.sysinfo.memory_stats()?;
        let cpu = self.sysinfo.cpu_sample()?;

        let mut per_vm = HashMap::with_capacity(current.len());
        for (name, next) in &current {
            let prev = self.snapshot.per_vm.get(name).map(|c| &c.data);
            per_vm.insert(name.clone(), diff(prev, next));
        }

        // One df invocation over every known image path; sorted so the
        // operand order is stable across ticks.
        let mut qcow2: Vec<(PathBuf, u64)> = current
            .values()
            .flat_map(|d| d.disk_paths())
            .collect();
        qcow2.sort();
        qcow2.dedup();
        let disks = self.sysinfo.disk_usage(&qcow2)?;

        let host_cpu_percent = if self.initialized {
            cpu_percent(self.snapshot.host.cpu, cpu)
        } else {
            0.0
        };

        let total_vm_rss = per_vm
            .values()
            .filter(|c| c.data.is_running())
            .filter_map(|c| c.data.mem_stat.map(|m| m.rss))
            .sum();

        let host_cpus = self.host_cpu_info.cpus().max(1);
        let total_vm_cpu_percent = per_vm
            .values()
            .map(|c| c.cpu_usage_percent)
            .sum::<f64>()
            / host_cpus as f64;

        self.snapshot = Snapshot {
            per_vm,
            host: HostSample {
                mem: mem.ram,
                swap: mem.swap,
                cpu,
                disks,
            },
            host_cpu_percent,
            total_vm_rss,
            total_vm_cpu_percent,
        };
        self.initialized = true;
        tracing::debug!(
            "sampled {} VMs, host cpu {:.2}%",
            self.snapshot.per_vm.len(),
            self.snapshot.host_cpu_percent
        );

        Ok(())
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Host CPU topology, read once at startup.
    #[must_use]
    pub fn host_cpu_info(&self) -> &HostCpuInfo {
        &self.host_cpu_info
    }

    /// Hardware virtualization flags present on the host (vmx/svm).
    #[must_use]
    pub fn virt_flags(&self) -> &HashSet<String> {
        &self.virt_flags
    }

    /// Per-VM record, if the VM exists in the snapshot.
    #[must_use]
    pub fn vm(&self, name: &str) -> Option<&VMCache> {
        self.snapshot.per_vm.get(name)
    }

    /// Static info of a VM, if present.
    #[must_use]
    pub fn info(&self, name: &str) -> Option<&DomainInfo> {
        self.vm(name).map(|c| &c.data.info)
    }

    /// Memory statistics of a VM, if present and running.
    #[must_use]
    pub fn mem_stat(&self, name: &str) -> Option<MemStat> {
        self.vm(name).and_then(|c| c.data.mem_stat)
    }

    /// Lifecycle state of a VM, if present.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<DomainState> {
        self.vm(name).map(|c| c.data.state)
    }

    /// Whether the VM exists and is running. Paused is not running.
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.state(name) == Some(DomainState::Running)
    }

    /// All VM names in the snapshot, sorted.
    #[must_use]
    pub fn vm_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.snapshot.per_vm.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resizes a VM's balloon after validating the bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Validation`] when the VM is unknown or
    /// `bytes` falls outside `[128 MiB, max_memory]`, and the adapter's
    /// error when the command fails.
    pub fn set_memory(&self, name: &str, bytes: u64) -> Result<()> {
        let info = self.info(name).ok_or_else(|| {
            CacheError::Validation(format!("unknown VM {name}"))
        })?;

        if bytes < MIN_VM_MEMORY || bytes > info.max_memory {
            return Err(CacheError::Validation(format!(
                "memory for {name} must be within [{}, {}], got {}",
                format_size(MIN_VM_MEMORY),
                format_size(info.max_memory),
                format_size(bytes)
            )));
        }

        self.hypervisor.set_memory(name, bytes)?;
        Ok(())
    }
}
