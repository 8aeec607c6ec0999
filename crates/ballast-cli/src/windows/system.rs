//! The host summary window.

use ballast_cache::SamplingCache;
use ballast_common::{format_size, MemoryStat};
use ballast_tui::{Window, WindowState};

use crate::fmt;

const GAUGE_WIDTH: usize = 20;

/// Host CPU, memory, swap and disk overview.
pub struct SystemWindow {
    state: WindowState,
}

impl SystemWindow {
    /// Creates the window; content arrives with the first refresh.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: WindowState::new("System"),
        }
    }

    /// Rebuilds the content from the latest snapshot.
    pub fn refresh(&mut self, cache: &SamplingCache) {
        let snapshot = cache.snapshot();
        let cpu_info = cache.host_cpu_info();
        let mut lines = Vec::new();

        let virt = if cache.virt_flags().is_empty() {
            fmt::red("none")
        } else {
            let mut flags: Vec<&str> =
                cache.virt_flags().iter().map(String::as_str).collect();
            flags.sort_unstable();
            fmt::green(&flags.join(","))
        };
        lines.push(format!(
            "cpu   {} ({}x{}x{}, {} threads)  virt: {}",
            cpu_info.model,
            cpu_info.sockets,
            cpu_info.cores_per_socket,
            cpu_info.threads_per_core,
            cpu_info.cpus(),
            virt
        ));

        lines.push(format!(
            "load  host {}  vms {}",
            fmt::severity(
                snapshot.host_cpu_percent,
                &format!("{:.2}%", snapshot.host_cpu_percent)
            ),
            fmt::severity(
                snapshot.total_vm_cpu_percent,
                &format!("{:.2}%", snapshot.total_vm_cpu_percent)
            ),
        ));

        lines.push(gauge_line("ram ", snapshot.host.mem));
        lines.push(gauge_line("swap", snapshot.host.swap));
        lines.push(format!(
            "vm rss total {}",
            format_size(snapshot.total_vm_rss)
        ));
        lines.push(String::new());

        if snapshot.host.disks.is_empty() {
            lines.push("no vm images found".to_string());
        } else {
            lines.push("disks backing vm images:".to_string());
            let mut devices: Vec<_> = snapshot.host.disks.iter().collect();
            devices.sort_by(|a, b| a.0.cmp(b.0));
            for (device, usage) in devices {
                let percent = usage.usage.percent_used();
                lines.push(format!(
                    " {device}  {} used {}/{} ({})  images {} ({})",
                    fmt::gauge(percent, 10),
                    format_size(usage.usage.used()),
                    format_size(usage.usage.total),
                    fmt::severity(percent, &format!("{percent:.0}%")),
                    format_size(usage.vm_bytes),
                    usage.qcow2_paths.len(),
                ));
            }
        }

        self.state.set_content(lines);
    }
}

fn gauge_line(label: &str, stat: MemoryStat) -> String {
    let percent = stat.percent_used();
    format!(
        "{label}  {} {}/{} ({})",
        fmt::gauge(percent, GAUGE_WIDTH),
        format_size(stat.used()),
        format_size(stat.total),
        fmt::severity(percent, &format!("{percent:.1}%")),
    )
}

impl Default for SystemWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl Window for SystemWindow {
    fn state(&self) -> &WindowState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut WindowState {
        &mut self.state
    }
}
