//! Window content and key routing against a fake hypervisor.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ballast_balloon::{BallooningController, BallooningParams, SystemClock};
use ballast_cache::SamplingCache;
use ballast_cli::app::App;
use ballast_cli::logsink::LogBuffer;
use ballast_cli::windows::{SystemWindow, VMWindow};
use ballast_common::units::GIB;
use ballast_common::MemoryStat;
use ballast_hostinfo::{CpuSample, DiskUsage, MemoryStats, SystemInfo};
use ballast_tui::{text::strip_ansi, Event, EventQueue, KeyOutcome, Window};
use ballast_virsh::{
    DiskStat, DomainData, DomainInfo, DomainState, GuestMemStat, HostCpuInfo,
    Hypervisor, MemStat,
};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeHypervisor {
    domains: Mutex<HashMap<String, DomainData>>,
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

    fn set_memory(&self, _name: &str, _bytes: u64) -> ballast_virsh::Result<()> {
        Ok(())
    }
}

struct FakeSystemInfo;

impl SystemInfo for FakeSystemInfo {
    fn memory_stats(&self) -> ballast_hostinfo::Result<MemoryStats> {
        Ok(MemoryStats {
            ram: MemoryStat::new(32 * GIB, 20 * GIB),
            swap: MemoryStat::new(8 * GIB, 8 * GIB),
        })
    }

    fn cpu_sample(&self) -> ballast_hostinfo::Result<CpuSample> {
        Ok(CpuSample::default())
    }

    fn disk_usage(
        &self,
        qcow2: &[(PathBuf, u64)],
    ) -> ballast_hostinfo::Result<HashMap<String, DiskUsage>> {
        let mut devices = HashMap::new();
        if !qcow2.is_empty() {
            let mut usage = DiskUsage {
                usage: MemoryStat::new(500 * GIB, 200 * GIB),
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
        Ok(["vmx".to_string()].into_iter().collect())
    }
}

fn running_vm(name: &str) -> DomainData {
    DomainData {
        info: DomainInfo {
            name: name.into(),
            cpus: 4,
            max_memory: 16 * GIB,
        },
        state: DomainState::Running,
        sampled_at_ms: 1_000,
        cpu_time_ms: 500,
        mem_stat: Some(MemStat {
            actual: 2 * GIB,
            rss: 2 * GIB + GIB / 2,
            last_updated_sec: 1,
            guest: Some(GuestMemStat {
                unused: GIB,
                available: 2 * GIB,
                usable: GIB,
                disk_caches: 0,
            }),
        }),
        disks: vec![DiskStat {
            name: "vda".into(),
            allocation: 20 * GIB,
            capacity: 20 * GIB,
            physical: 25 * GIB,
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
        disks: vec![DiskStat {
            name: "vda".into(),
            allocation: 10 * GIB,
            capacity: 10 * GIB,
            physical: 3 * GIB,
            path: None,
        }],
    }
}

struct Rig {
    hypervisor: Arc<FakeHypervisor>,
    cache: SamplingCache,
    balloon: BallooningController,
    queue: Arc<EventQueue<App>>,
}

impl Rig {
    fn new(domains: Vec<DomainData>) -> Self {
        let hypervisor = Arc::new(FakeHypervisor::default());
        hypervisor.set_domains(domains);
        let mut cache =
            SamplingCache::new(hypervisor.clone(), Box::new(FakeSystemInfo))
                .unwrap();
        cache.update().unwrap();
        let balloon = BallooningController::new(
            BallooningParams::default(),
            Arc::new(SystemClock),
        );
        Self {
            hypervisor,
            cache,
            balloon,
            queue: Arc::new(EventQueue::new()),
        }
    }

    fn vm_window(&self) -> VMWindow {
        let mut window =
            VMWindow::new(self.queue.clone(), self.hypervisor.clone());
        window.refresh(&self.cache, &self.balloon);
        window
    }
}

// ============================================================================
// VMWindow
// ============================================================================

#[test]
fn vm_window_lists_all_domains_with_cursor_on_titles() {
    let rig = Rig::new(vec![running_vm("alpha"), shut_off_vm("beta")]);
    let window = rig.vm_window();

    let plain: Vec<String> = window
        .state()
        .lines()
        .iter()
        .map(|l| strip_ansi(l))
        .collect();
    let text = plain.join("\n");
    assert!(text.contains("alpha"));
    assert!(text.contains("running"));
    assert!(text.contains("beta"));
    assert!(text.contains("shut off"));
    // Running VM shows memory and balloon rows.
    assert!(text.contains("mem 2G/16G"));
    assert!(text.contains("balloon:"));
    // Disk row with the overhead from 25G physical over 20G allocated.
    assert!(text.contains("+25%"));

    // The cursor starts on the first title line.
    assert_eq!(window.selected().as_deref(), Some("alpha"));
}

#[test]
fn vm_window_cursor_steps_between_vms() {
    let rig = Rig::new(vec![running_vm("alpha"), shut_off_vm("beta")]);
    let mut window = rig.vm_window();

    assert!(matches!(window.handle_key("down"), KeyOutcome::Consumed));
    assert_eq!(window.selected().as_deref(), Some("beta"));
    assert!(matches!(window.handle_key("up"), KeyOutcome::Consumed));
    assert_eq!(window.selected().as_deref(), Some("alpha"));
}

#[test]
fn vm_window_power_key_opens_picker() {
    let rig = Rig::new(vec![running_vm("alpha")]);
    let mut window = rig.vm_window();
    assert!(matches!(window.handle_key("p"), KeyOutcome::Popup(_)));
}

#[test]
fn vm_window_hides_disks_of_stopped_vms_until_toggled() {
    let rig = Rig::new(vec![shut_off_vm("beta")]);
    let mut window = rig.vm_window();

    let text = window.state().lines().join("\n");
    assert!(!text.contains("vda"));

    assert!(matches!(window.handle_key("d"), KeyOutcome::Consumed));
    window.refresh(&rig.cache, &rig.balloon);
    let text = window.state().lines().join("\n");
    assert!(text.contains("vda"));
}

#[test]
fn vm_window_ignores_actions_without_selection() {
    let rig = Rig::new(Vec::new());
    let mut window = rig.vm_window();
    assert!(window.selected().is_none());
    assert!(matches!(window.handle_key("p"), KeyOutcome::Ignored));
}

// ============================================================================
// SystemWindow
// ============================================================================

#[test]
fn system_window_summarizes_host() {
    let rig = Rig::new(vec![running_vm("alpha")]);
    let mut window = SystemWindow::new();
    window.refresh(&rig.cache);

    let plain: Vec<String> = window
        .state()
        .lines()
        .iter()
        .map(|l| strip_ansi(l))
        .collect();
    let text = plain.join("\n");
    assert!(text.contains("x86_64"));
    assert!(text.contains("8 threads"));
    assert!(text.contains("vmx"));
    assert!(text.contains("vm rss total 2.5G"));
    assert!(text.contains("/dev/sda1"));
}

// ============================================================================
// App key routing
// ============================================================================

fn build_app(rig: Rig) -> (Arc<EventQueue<App>>, App) {
    let queue = rig.queue.clone();
    let app = App::new(
        queue.clone(),
        rig.hypervisor.clone(),
        rig.cache,
        rig.balloon,
        Arc::new(LogBuffer::default()),
        80,
        24,
    );
    (queue, app)
}

#[test]
fn quit_key_stops_queue() {
    let (queue, mut app) = build_app(Rig::new(Vec::new()));
    app.handle_event(Event::Key("q".to_string())).unwrap();
    assert!(queue.is_stopped());
}

#[test]
fn help_popup_swallows_quit_once() {
    let (queue, mut app) = build_app(Rig::new(Vec::new()));

    app.handle_event(Event::Key("h".to_string())).unwrap();
    // The popup consumes the first q (closing itself)...
    app.handle_event(Event::Key("q".to_string())).unwrap();
    assert!(!queue.is_stopped());
    // ...the second one quits.
    app.handle_event(Event::Key("q".to_string())).unwrap();
    assert!(queue.is_stopped());
}

#[test]
fn resize_event_relayouts_without_panicking() {
    let (_queue, mut app) = build_app(Rig::new(vec![running_vm("alpha")]));
    app.handle_event(Event::Resize {
        width: 120,
        height: 40,
    })
    .unwrap();
    app.handle_event(Event::Resize {
        width: 20,
        height: 5,
    })
    .unwrap();
}

#[test]
fn tick_refreshes_windows() {
    let rig = Rig::new(vec![running_vm("alpha")]);
    let hypervisor = rig.hypervisor.clone();
    let (_queue, mut app) = build_app(rig);

    app.tick();
    hypervisor.set_domains(vec![running_vm("alpha"), running_vm("gamma")]);
    app.tick();
}
