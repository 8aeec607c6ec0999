//! The VM list window and its per-VM actions.

use std::sync::Arc;

use ballast_balloon::BallooningController;
use ballast_cache::{SamplingCache, VMCache};
use ballast_common::format_size;
use ballast_tui::{
    window_ref, Cursor, EventQueue, KeyOutcome, PickerWindow, Window,
    WindowState,
};
use ballast_virsh::{DomainState, Hypervisor};

use crate::app::App;
use crate::{fmt, viewer};

/// The main VM list: one block of lines per domain, cursor limited to
/// the title lines.
pub struct VMWindow {
    state: WindowState,
    queue: Arc<EventQueue<App>>,
    hypervisor: Arc<dyn Hypervisor>,
    /// Title-line index → VM name, in display order.
    vm_lines: Vec<(usize, String)>,
    show_disks_when_off: bool,
}

impl VMWindow {
    /// Creates the window.
    #[must_use]
    pub fn new(
        queue: Arc<EventQueue<App>>,
        hypervisor: Arc<dyn Hypervisor>,
    ) -> Self {
        let mut state = WindowState::new("Virtual Machines");
        state.set_hint("p:power  v:viewer  b:balloon  d:disks  enter:details");
        Self {
            state,
            queue,
            hypervisor,
            vm_lines: Vec::new(),
            show_disks_when_off: false,
        }
    }

    /// The VM under the cursor.
    #[must_use]
    pub fn selected(&self) -> Option<String> {
        let pos = self.state.cursor().position()?;
        self.vm_lines
            .iter()
            .find(|(line, _)| *line == pos)
            .map(|(_, name)| name.clone())
    }

    /// Rebuilds the content from the latest snapshot, keeping the
    /// cursor near its previous position.
    pub fn refresh(
        &mut self,
        cache: &SamplingCache,
        balloon: &BallooningController,
    ) {
        let mut lines: Vec<String> = Vec::new();
        let mut vm_lines = Vec::new();

        for name in cache.vm_names() {
            let Some(vm) = cache.vm(&name) else {
                continue;
            };
            vm_lines.push((lines.len(), name.clone()));
            lines.push(title_line(&name, vm));

            if vm.data.mem_stat.is_some() {
                lines.push(mem_line(vm));
                lines.push(format!(
                    "   balloon: {}",
                    balloon.status(&name).unwrap_or("-")
                ));
            }

            let show_disks = vm.data.is_running() || self.show_disks_when_off;
            if show_disks {
                for disk in &vm.data.disks {
                    lines.push(disk_line(disk));
                }
            }
            lines.push(String::new());
        }

        let requested = self.state.cursor().position().unwrap_or(0);
        let allowed: Vec<usize> =
            vm_lines.iter().map(|(line, _)| *line).collect();
        self.vm_lines = vm_lines;
        self.state.set_content(lines);
        self.state.set_cursor(Cursor::limited(allowed, requested));
    }

    fn power_picker(&self, name: &str) -> KeyOutcome {
        let start = {
            let hypervisor = self.hypervisor.clone();
            let name = name.to_string();
            move || hypervisor.start(&name)
        };
        let shutdown = {
            let hypervisor = self.hypervisor.clone();
            let name = name.to_string();
            move || hypervisor.shutdown(&name)
        };
        let reboot = {
            let hypervisor = self.hypervisor.clone();
            let name = name.to_string();
            move || {
                if let Err(err) = hypervisor.reboot(&name) {
                    tracing::error!("reboot {name}: {err}");
                }
            }
        };
        let reset = {
            let hypervisor = self.hypervisor.clone();
            let name = name.to_string();
            move || {
                if let Err(err) = hypervisor.reset(&name) {
                    tracing::error!("reset {name}: {err}");
                }
            }
        };

        let picker = PickerWindow::new(format!("power: {name}"))
            .option('s', "start", start)
            .option('o', "shutdown (graceful)", shutdown)
            .option('r', "reboot", reboot)
            .option('R', "reset (hard)", reset);
        KeyOutcome::Popup(window_ref(picker))
    }
}

impl Window for VMWindow {
    fn state(&self) -> &WindowState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut WindowState {
        &mut self.state
    }

    fn handle_key(&mut self, key: &str) -> KeyOutcome {
        if let KeyOutcome::Consumed = self.state.default_key(key) {
            return KeyOutcome::Consumed;
        }
        let Some(name) = self.selected() else {
            return KeyOutcome::Ignored;
        };

        match key {
            "p" => self.power_picker(&name),
            "enter" => {
                // Details read the cache, which the app owns.
                self.queue.submit(move |app: &mut App| {
                    app.open_vm_details(&name);
                });
                KeyOutcome::Consumed
            }
            "v" => {
                viewer::launch(&name);
                KeyOutcome::Consumed
            }
            "b" => {
                // The toggle touches controller state owned by the
                // app; route it through the queue like every other
                // deferred mutation.
                self.queue.submit(move |app: &mut App| {
                    if app.cache.is_running(&name) {
                        app.balloon.toggle(&name);
                        app.refresh_windows();
                    } else {
                        tracing::info!(
                            "{name} is not running, ballooning unchanged"
                        );
                    }
                });
                KeyOutcome::Consumed
            }
            "d" => {
                self.show_disks_when_off = !self.show_disks_when_off;
                self.queue
                    .submit(|app: &mut App| app.refresh_windows());
                KeyOutcome::Consumed
            }
            _ => KeyOutcome::Ignored,
        }
    }
}

fn title_line(name: &str, vm: &VMCache) -> String {
    let state = match vm.data.state {
        DomainState::Running => fmt::green("running "),
        DomainState::ShutOff => fmt::dim("shut off"),
        DomainState::Paused => fmt::yellow("paused  "),
        DomainState::Other => fmt::yellow("other   "),
    };

    let mut line = format!("{name:<20} {state}");
    if vm.data.state == DomainState::Running {
        line.push_str(&format!(
            "  {} vcpus  cpu {}",
            vm.data.info.cpus,
            fmt::severity(
                vm.cpu_usage_percent,
                &format!("{:>5.1}%", vm.cpu_usage_percent)
            ),
        ));
    }
    line
}

fn mem_line(vm: &VMCache) -> String {
    let Some(mem) = vm.data.mem_stat else {
        return String::new();
    };

    let guest = match mem.guest_mem() {
        Some(guest) => fmt::severity(
            guest.percent_used(),
            &format!("guest used {:.1}%", guest.percent_used()),
        ),
        None => fmt::dim("no guest stats"),
    };

    let mut line = format!(
        "   mem {}/{}  {}  rss {}",
        format_size(mem.actual),
        format_size(vm.data.info.max_memory),
        guest,
        format_size(mem.rss),
    );
    if vm.stale() {
        if let Some(age) = vm.mem_data_age_sec {
            line.push_str(&fmt::red(&format!("  [stale {age}s]")));
        }
    }
    line
}

fn disk_line(disk: &ballast_virsh::DiskStat) -> String {
    let overhead = disk.overhead_percent();
    let overhead_text = format!("{overhead:+}%");
    let overhead_text = if overhead > 0 {
        fmt::yellow(&overhead_text)
    } else {
        fmt::dim(&overhead_text)
    };
    let path = disk
        .path
        .as_deref()
        .map_or(String::new(), |p| format!("  {}", p.display()));

    format!(
        "   {:<6} {} of {} on host ({overhead_text}){path}",
        disk.name,
        format_size(disk.physical),
        format_size(disk.capacity),
    )
}
