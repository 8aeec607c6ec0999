//! The application controller: wires cache, controller, windows and
//! the event loop together.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::Arc;

use ballast_balloon::BallooningController;
use ballast_cache::SamplingCache;
use ballast_common::format_size;
use ballast_tui::{
    window_ref, Event, EventQueue, HandlerResult, PopupWindow, Rect, Screen,
    Window,
};
use ballast_virsh::Hypervisor;

use crate::logsink::LogBuffer;
use crate::windows::{LogWindow, SystemWindow, VMWindow};

/// Height of the System/Log row at the bottom of the layout.
const BOTTOM_HEIGHT: u16 = 13;

/// The event-loop context: owns every piece of mutable state the loop
/// serializes.
pub struct App {
    pub(crate) queue: Arc<EventQueue<App>>,
    pub(crate) cache: SamplingCache,
    pub(crate) balloon: BallooningController,
    screen: Screen,
    vm_window: Rc<RefCell<VMWindow>>,
    system_window: Rc<RefCell<SystemWindow>>,
    log_window: Rc<RefCell<LogWindow>>,
    log_buffer: Arc<LogBuffer>,
}

impl App {
    /// Builds the screen with the three tiled windows and lays them
    /// out for the given terminal size.
    pub fn new(
        queue: Arc<EventQueue<App>>,
        hypervisor: Arc<dyn Hypervisor>,
        cache: SamplingCache,
        balloon: BallooningController,
        log_buffer: Arc<LogBuffer>,
        width: u16,
        height: u16,
    ) -> Self {
        let mut screen = Screen::new(width, height);

        let vm_window = Rc::new(RefCell::new(VMWindow::new(
            queue.clone(),
            hypervisor,
        )));
        let system_window = Rc::new(RefCell::new(SystemWindow::new()));
        let log_window = Rc::new(RefCell::new(LogWindow::new()));

        screen.add_tiled('1', vm_window.clone());
        screen.add_tiled('2', system_window.clone());
        screen.add_tiled('3', log_window.clone());

        let mut app = Self {
            queue,
            cache,
            balloon,
            screen,
            vm_window,
            system_window,
            log_window,
            log_buffer,
        };
        app.relayout_tiled();
        app
    }

    /// One sampling tick: refresh the cache, run the ballooning
    /// controller, rebuild window content. A failed sample aborts the
    /// tick; the next one retries.
    pub fn tick(&mut self) {
        if let Err(err) = self.cache.update() {
            tracing::warn!("sampling failed: {err}");
            return;
        }
        self.balloon.update(&self.cache);
        self.refresh_windows();
    }

    /// Rebuilds the VM and system windows from the current snapshot.
    pub fn refresh_windows(&mut self) {
        self.vm_window
            .borrow_mut()
            .refresh(&self.cache, &self.balloon);
        self.system_window.borrow_mut().refresh(&self.cache);
    }

    /// The event-loop handler.
    ///
    /// # Errors
    ///
    /// Propagates terminal I/O failures; the loop logs them and keeps
    /// going.
    pub fn handle_event(&mut self, event: Event) -> HandlerResult {
        match event {
            Event::Key(key) => {
                if !self.screen.handle_key(&key) {
                    match key.as_str() {
                        "q" | "esc" => {
                            tracing::info!("shutting down");
                            self.queue.stop();
                        }
                        "h" | "?" => self.open_help(),
                        _ => {}
                    }
                }
            }
            Event::Mouse(mouse) => {
                self.screen.handle_mouse(&mouse);
            }
            Event::Resize { width, height } => {
                self.screen.layout(width, height);
                self.relayout_tiled();
            }
            Event::QueueEmpty => {
                // The coalesced repaint point: every batch of events
                // ends here exactly once.
                self.drain_logs();
                self.update_status();
                let stdout = io::stdout();
                self.screen.repaint(&mut stdout.lock())?;
            }
            // Error events terminate the loop before reaching us.
            Event::Error(_) => {}
        }
        Ok(())
    }

    /// Opens a popup with everything known about one VM.
    pub(crate) fn open_vm_details(&mut self, name: &str) {
        let Some(vm) = self.cache.vm(name) else {
            return;
        };

        let mut lines = vec![
            format!("state        {}", vm.data.state.label()),
            format!("vcpus        {}", vm.data.info.cpus),
            format!(
                "max memory   {}",
                format_size(vm.data.info.max_memory)
            ),
            format!("cpu usage    {:.1}%", vm.cpu_usage_percent),
        ];

        if let Some(mem) = vm.data.mem_stat {
            lines.push(format!("actual       {}", format_size(mem.actual)));
            lines.push(format!("rss          {}", format_size(mem.rss)));
            match mem.guest_mem() {
                Some(guest) => lines.push(format!(
                    "guest mem    {} of {} used ({:.1}%)",
                    format_size(guest.used()),
                    format_size(guest.total),
                    guest.percent_used()
                )),
                None => {
                    lines.push("guest mem    no statistics".to_string());
                }
            }
            if let Some(age) = vm.mem_data_age_sec {
                let marker = if vm.stale() { " (stale)" } else { "" };
                lines.push(format!("data age     {age}s{marker}"));
            }
            lines.push(format!(
                "balloon      {}",
                self.balloon.status(name).unwrap_or("-")
            ));
            if let Some(params) = self.balloon.params(name) {
                lines.push(format!(
                    "tuning       inflate >={}% (+{}%), deflate <={}% (-{}%)",
                    params.trigger_increase,
                    params.increase_by,
                    params.trigger_decrease,
                    params.decrease_by
                ));
                lines.push(format!(
                    "floor        {}",
                    format_size(params.min_actual)
                ));
            }
        }

        if !vm.data.disks.is_empty() {
            lines.push(String::new());
            for disk in &vm.data.disks {
                lines.push(format!(
                    "{:<6} {} capacity, {} on host ({:+}%)",
                    disk.name,
                    format_size(disk.capacity),
                    format_size(disk.physical),
                    disk.overhead_percent()
                ));
                if let Some(path) = &disk.path {
                    lines.push(format!("       {}", path.display()));
                }
            }
        }

        let mut popup = PopupWindow::new(name, 24);
        popup.set_content(lines);
        self.screen.add_popup(window_ref(popup));
    }

    fn open_help(&mut self) {
        let mut popup = PopupWindow::new("help", 22);
        popup.set_content([
            "1 / 2 / 3    switch window",
            "up/down j/k  move cursor",
            "pgup/pgdn    page, ctrl-u/d half-page",
            "home / end   first / last line",
            "",
            "p            power menu for the selected vm",
            "v            open graphical viewer",
            "b            toggle auto-ballooning",
            "d            show disks of stopped vms",
            "enter        vm details",
            "",
            "h / ?        this help",
            "q / esc      close popup or quit",
        ]);
        self.screen.add_popup(window_ref(popup));
    }

    fn drain_logs(&mut self) {
        let lines = self.log_buffer.drain();
        if !lines.is_empty() {
            self.log_window.borrow_mut().append(lines);
        }
    }

    fn update_status(&mut self) {
        let hint = self
            .screen
            .active_window()
            .map(|w| w.borrow().state().hint().to_string())
            .unwrap_or_default();
        self.screen.set_status(format!(
            " q:quit  1:vms  2:system  3:log │ {hint}"
        ));
    }

    /// Positions the tiled windows: VM list on top, System (left) and
    /// Log (right) above the status bar.
    fn relayout_tiled(&mut self) {
        let (width, height) = self.screen.size();
        let usable = height.saturating_sub(1);
        let bottom = BOTTOM_HEIGHT.min(usable);
        let vm_height = usable.saturating_sub(bottom);
        let system_width = (width / 2).min(60);

        self.vm_window
            .borrow_mut()
            .state_mut()
            .set_rect(Rect::new(0, 0, width, vm_height));
        self.system_window
            .borrow_mut()
            .state_mut()
            .set_rect(Rect::new(0, vm_height, system_width, bottom));
        self.log_window.borrow_mut().state_mut().set_rect(Rect::new(
            system_width,
            vm_height,
            width.saturating_sub(system_width),
            bottom,
        ));
    }
}
