//! Sampling cache behavior against scripted providers.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ballast_cache::{CacheError, SamplingCache};
use ballast_common::units::{GIB, MIB};
use ballast_common::MemoryStat;
use ballast_hostinfo::{CpuSample, DiskUsage, MemoryStats, SystemInfo};
use ballast_virsh::{
    DiskStat, DomainData, DomainInfo, DomainState, HostCpuInfo, Hypervisor,
    MemStat,
};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeHypervisor {
    domains: Mutex<HashMap<String, DomainData>>,
    set_memory_calls: Mutex<Vec<(String, u64)>>,
}

impl FakeHypervisor {
    fn set_domains(&self, domains: Vec<DomainData>) {
        *self.domains.lock().unwrap() = domains
            .into_iter()
            .map(|d| (d.info.name.clone(), d))
            .collect();
    }
}

impl Hypervisor for FakeHypervisor {
    fn domain_data(&self) -> ballast_virsh::Result<HashMap<String, DomainData>> {
        Ok(self.domains.lock().unwrap().clone())
    }

    fn host_info(&self) -> ballast_virsh::Result<HostCpuInfo> {
        Ok(HostCpuInfo {
            model: "x86_64".into(),
            sockets: 1,
            cores_per_socket: 4,
            threads_per_core: 2,
        })
    }

    fn start(&self, _name: &str) {}
    fn shutdown(&self, _name: &str) {}

    fn reboot(&self, _name: &str) -> ballast_virsh::Result<()> {
        Ok(())
    }

    fn reset(&self, _name: &str) -> ballast_virsh::Result<()> {
        Ok(())
    }

    fn set_memory(&self, name: &str, bytes: u64) -> ballast_virsh::Result<()> {
        self.set_memory_calls
            .lock()
            .unwrap()
            .push((name.to_string(), bytes));
        Ok(())
    }
}

struct FakeSystemInfo;

impl SystemInfo for FakeSystemInfo {
    fn memory_stats(&self) -> ballast_hostinfo::Result<MemoryStats> {
        Ok(MemoryStats {
            ram: MemoryStat::new(32 * GIB, 16 * GIB),
            swap: MemoryStat::new(8 * GIB, 8 * GIB),
        })
    }

    fn cpu_sample(&self) -> ballast_hostinfo::Result<CpuSample> {
        Ok(CpuSample {
            total_clocks: 1000,
            idle_clocks: 900,
        })
    }

    fn disk_usage(
        &self,
        qcow2: &[(PathBuf, u64)],
    ) -> ballast_hostinfo::Result<HashMap<String, DiskUsage>> {
        // Everything resolves to one device.
        let mut devices = HashMap::new();
        if !qcow2.is_empty() {
            let mut usage = DiskUsage {
                usage: MemoryStat::new(500 * GIB, 100 * GIB),
                ..DiskUsage::default()
            };
            for (path, physical) in qcow2 {
                usage.vm_bytes += physical;
                usage.qcow2_paths.push(path.clone());
            }
            devices.insert("/dev/sda1".to_string(), usage);
        }
        Ok(devices)
    }

    fn cpu_flags(&self) -> ballast_hostinfo::Result<HashSet<String>> {
        Ok(["fpu", "vmx"].iter().map(|s| s.to_string()).collect())
    }
}

// ============================================================================
// Builders
// ============================================================================

fn running_vm(name: &str, sampled_at_ms: u64, cpu_time_ms: u64, rss: u64) -> DomainData {
    DomainData {
        info: DomainInfo {
            name: name.into(),
            cpus: 2,
            max_memory: 16 * GIB,
        },
        state: DomainState::Running,
        sampled_at_ms,
        cpu_time_ms,
        mem_stat: Some(MemStat {
            actual: 2 * GIB,
            rss,
            last_updated_sec: sampled_at_ms / 1000,
            guest: None,
        }),
        disks: vec![DiskStat {
            name: "vda".into(),
            allocation: 10 * GIB,
            capacity: 10 * GIB,
            physical: 4 * GIB,
            path: Some(PathBuf::from(format!("/images/{name}.qcow2"))),
        }],
    }
}

fn shut_off_vm(name: &str) -> DomainData {
    DomainData {
        info: DomainInfo {
            name: name.into(),
            cpus: 0,
            max_memory: 0,
        },
        state: DomainState::ShutOff,
        sampled_at_ms: 0,
        cpu_time_ms: 0,
        mem_stat: None,
        disks: Vec::new(),
    }
}

fn new_cache(hypervisor: &Arc<FakeHypervisor>) -> SamplingCache {
    SamplingCache::new(hypervisor.clone(), Box::new(FakeSystemInfo)).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn aggregates_match_per_vm_sums() {
    let hypervisor = Arc::new(FakeHypervisor::default());
    hypervisor.set_domains(vec![
        running_vm("a", 1_000, 100, 2 * GIB),
        running_vm("b", 1_000, 100, 3 * GIB),
        shut_off_vm("c"),
    ]);
    let mut cache = new_cache(&hypervisor);
    cache.update().unwrap();

    // First tick: no previous sample, so CPU percents are zero.
    let snap = cache.snapshot();
    assert_eq!(snap.total_vm_rss, 5 * GIB);
    assert_eq!(snap.total_vm_cpu_percent, 0.0);
    assert_eq!(snap.host_cpu_percent, 0.0);

    hypervisor.set_domains(vec![
        running_vm("a", 3_000, 1_100, 2 * GIB),
        running_vm("b", 3_000, 500, 3 * GIB),
        shut_off_vm("c"),
    ]);
    cache.update().unwrap();

    let snap = cache.snapshot();
    let sum: f64 = snap
        .per_vm
        .values()
        .map(|c| c.cpu_usage_percent)
        .sum();
    // a: 1000ms over 2000ms = 50%; b: 400ms over 2000ms = 20%.
    assert!((sum - 70.0).abs() < f64::EPSILON);
    assert!((snap.total_vm_cpu_percent - sum / 8.0).abs() < f64::EPSILON);
    assert_eq!(snap.total_vm_rss, 5 * GIB);
}

#[test]
fn disk_usage_aggregates_all_vm_images() {
    let hypervisor = Arc::new(FakeHypervisor::default());
    hypervisor.set_domains(vec![
        running_vm("a", 1_000, 0, GIB),
        running_vm("b", 1_000, 0, GIB),
    ]);
    let mut cache = new_cache(&hypervisor);
    cache.update().unwrap();

    let disks = &cache.snapshot().host.disks;
    assert_eq!(disks.len(), 1);
    let sda = &disks["/dev/sda1"];
    assert_eq!(sda.vm_bytes, 8 * GIB);
    assert_eq!(sda.qcow2_paths.len(), 2);
}

#[test]
fn lookups_by_absent_name_are_none() {
    let hypervisor = Arc::new(FakeHypervisor::default());
    let mut cache = new_cache(&hypervisor);
    cache.update().unwrap();

    assert!(cache.vm("ghost").is_none());
    assert!(cache.info("ghost").is_none());
    assert!(cache.mem_stat("ghost").is_none());
    assert!(cache.state("ghost").is_none());
    assert!(!cache.is_running("ghost"));
}

#[test]
fn paused_vm_is_not_running() {
    let hypervisor = Arc::new(FakeHypervisor::default());
    let mut paused = running_vm("p", 1_000, 0, GIB);
    paused.state = DomainState::Paused;
    paused.mem_stat = None;
    hypervisor.set_domains(vec![paused]);

    let mut cache = new_cache(&hypervisor);
    cache.update().unwrap();

    assert_eq!(cache.state("p"), Some(DomainState::Paused));
    assert!(!cache.is_running("p"));
    assert_eq!(cache.snapshot().total_vm_rss, 0);
}

#[test]
fn set_memory_validates_bounds() {
    let hypervisor = Arc::new(FakeHypervisor::default());
    hypervisor.set_domains(vec![running_vm("a", 1_000, 0, GIB)]);
    let mut cache = new_cache(&hypervisor);
    cache.update().unwrap();

    assert!(matches!(
        cache.set_memory("a", 64 * MIB),
        Err(CacheError::Validation(_))
    ));
    assert!(matches!(
        cache.set_memory("a", 17 * GIB),
        Err(CacheError::Validation(_))
    ));
    assert!(matches!(
        cache.set_memory("ghost", GIB),
        Err(CacheError::Validation(_))
    ));
    assert!(hypervisor.set_memory_calls.lock().unwrap().is_empty());

    cache.set_memory("a", 4 * GIB).unwrap();
    assert_eq!(
        hypervisor.set_memory_calls.lock().unwrap().as_slice(),
        &[("a".to_string(), 4 * GIB)]
    );
}

#[test]
fn virt_flags_filtered_to_virtualization() {
    let hypervisor = Arc::new(FakeHypervisor::default());
    let cache = new_cache(&hypervisor);
    assert!(cache.virt_flags().contains("vmx"));
    assert!(!cache.virt_flags().contains("fpu"));
}

#[test]
fn vm_names_sorted() {
    let hypervisor = Arc::new(FakeHypervisor::default());
    hypervisor.set_domains(vec![
        shut_off_vm("zeta"),
        shut_off_vm("alpha"),
        shut_off_vm("mike"),
    ]);
    let mut cache = new_cache(&hypervisor);
    cache.update().unwrap();
    assert_eq!(cache.vm_names(), vec!["alpha", "mike", "zeta"]);
}
