//! Per-VM balloon feedback loops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ballast_cache::SamplingCache;
use ballast_common::format_size;

use crate::clock::Clock;
use crate::params::BallooningParams;

/// One VM's feedback loop state.
///
/// Inflates immediately on pressure; deflates only outside the
/// back-off window. Bookkeeping advances only when a resize command
/// actually succeeded.
struct VmBalloon {
    name: String,
    params: BallooningParams,
    enabled: bool,
    back_off_until: Option<std::time::Instant>,
    last_update_sec: Option<u64>,
    status: String,
}

impl VmBalloon {
    fn new(name: String, params: BallooningParams) -> Self {
        Self {
            name,
            params,
            enabled: true,
            back_off_until: None,
            last_update_sec: None,
            status: String::new(),
        }
    }

    /// Extends the back-off window, never shortening an existing one.
    fn back_off_for(&mut self, clock: &dyn Clock, duration: Duration) {
        let end = clock.now() + duration;
        self.back_off_until = Some(match self.back_off_until {
            Some(existing) if existing > end => existing,
            _ => end,
        });
    }

    fn tick(&mut self, cache: &SamplingCache, clock: &dyn Clock) {
        if !self.enabled {
            self.status = "disabled".to_string();
            self.back_off_until = None;
            return;
        }

        // Absent memory statistics cover both "shut off" and "paused";
        // either way the VM will need a settling period after it comes
        // (back) up.
        let Some(mem) = cache.mem_stat(&self.name) else {
            self.back_off_for(clock, self.params.boot_back_off);
            self.status = "vm stopped".to_string();
            return;
        };

        let Some(guest_mem) = mem.guest_mem() else {
            self.status = "ballooning unsupported".to_string();
            return;
        };

        if self.last_update_sec == Some(mem.last_updated_sec) {
            self.status = "no new data".to_string();
            return;
        }

        let percent_used = guest_mem.percent_used();

        let delta: i64 = if percent_used >= self.params.trigger_increase {
            // Pressure: inflate now, back-off or not.
            i64::from(self.params.increase_by)
        } else if percent_used <= self.params.trigger_decrease {
            if let Some(until) = self.back_off_until {
                let now = clock.now();
                if now < until {
                    let remaining = (until - now).as_secs_f64().ceil() as u64;
                    self.status = format!("backing off for {remaining}s");
                    return;
                }
            }
            -i64::from(self.params.decrease_by)
        } else {
            self.status = "sweet spot".to_string();
            return;
        };

        let Some(info) = cache.info(&self.name) else {
            return;
        };
        let max_memory = info.max_memory;

        let scaled =
            (i128::from(mem.actual) * i128::from(100 + delta) / 100) as u64;
        let new_actual = scaled.max(self.params.min_actual).min(max_memory);

        if new_actual == mem.actual {
            self.status = if delta > 0 {
                format!(
                    "cannot increase, already at maximum ({})",
                    format_size(max_memory)
                )
            } else {
                format!(
                    "cannot decrease, already at minimum ({})",
                    format_size(new_actual)
                )
            };
            return;
        }

        match cache.set_memory(&self.name, new_actual) {
            Ok(()) => {
                self.back_off_for(clock, self.params.back_off);
                self.last_update_sec = Some(mem.last_updated_sec);
                self.status = if delta > 0 && new_actual < scaled {
                    format!(
                        "increase capped at maximum, updating actual to {}",
                        format_size(new_actual)
                    )
                } else {
                    format!(
                        "updating actual by {delta}% to {}",
                        format_size(new_actual)
                    )
                };
            }
            Err(err) => {
                tracing::error!("ballooning {}: {err}", self.name);
                self.status = "memory update failed (see log)".to_string();
            }
        }
    }
}

/// Drives one [`VmBalloon`] per known VM.
pub struct BallooningController {
    defaults: BallooningParams,
    clock: Arc<dyn Clock>,
    vms: HashMap<String, VmBalloon>,
}

impl BallooningController {
    /// Creates a controller handing `defaults` to every new VM.
    #[must_use]
    pub fn new(defaults: BallooningParams, clock: Arc<dyn Clock>) -> Self {
        Self {
            defaults,
            clock,
            vms: HashMap::new(),
        }
    }

    /// Runs one tick over every VM in the snapshot.
    ///
    /// Sub-controllers appear when a VM is first seen and are pruned
    /// when it disappears.
    pub fn update(&mut self, cache: &SamplingCache) {
        self.vms.retain(|name, _| cache.vm(name).is_some());

        for name in cache.vm_names() {
            let vm = self.vms.entry(name.clone()).or_insert_with(|| {
                VmBalloon::new(name, self.defaults.clone())
            });
            vm.tick(cache, self.clock.as_ref());
        }
    }

    /// The VM's status line from its last tick, if the VM is known.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<&str> {
        self.vms.get(name).map(|vm| vm.status.as_str())
    }

    /// The VM's current parameters, if the VM is known.
    #[must_use]
    pub fn params(&self, name: &str) -> Option<&BallooningParams> {
        self.vms.get(name).map(|vm| &vm.params)
    }

    /// Whether ballooning is enabled for the VM. Unknown VMs report
    /// enabled, matching the default a new sub-controller gets.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.vms.get(name).map_or(true, |vm| vm.enabled)
    }

    /// Flips the enable switch, clearing any active cool-down: the
    /// operator asked for an immediate effect.
    pub fn toggle(&mut self, name: &str) {
        if let Some(vm) = self.vms.get_mut(name) {
            vm.enabled = !vm.enabled;
            vm.back_off_until = None;
            tracing::info!(
                "ballooning for {name} {}",
                if vm.enabled { "enabled" } else { "disabled" }
            );
        }
    }

    /// Replaces one VM's parameters; clears the back-off so the new
    /// tuning applies on the next tick.
    pub fn set_params(&mut self, name: &str, params: BallooningParams) {
        if let Some(vm) = self.vms.get_mut(name) {
            vm.params = params;
            vm.back_off_until = None;
        }
    }
}
