//! ballast — terminal dashboard for libvirt guests with
//! auto-ballooning.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ballast_balloon::{BallooningController, BallooningParams, SystemClock};
use ballast_cache::SamplingCache;
use ballast_hostinfo::ProcSystemInfo;
use ballast_tui::{spawn_keyboard_reader, EventQueue, TerminalGuard};
use ballast_virsh::{Hypervisor, VirshAdapter};

use ballast_cli::app::App;
use ballast_cli::logsink::{LogBuffer, WindowLayer};
use ballast_cli::{sigwinch, timer};

/// Terminal dashboard for libvirt guests with auto-ballooning.
#[derive(Debug, Parser)]
#[command(name = "ballast", version, about)]
struct Cli {
    /// Also write a full tracing log to this file.
    #[arg(long, value_name = "FILE")]
    debug_log: Option<PathBuf>,

    /// Sampling interval in seconds.
    #[arg(long, default_value_t = 2, value_name = "SECS")]
    interval: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_buffer = Arc::new(LogBuffer::default());
    init_tracing(&cli, log_buffer.clone())?;
    run(&cli, log_buffer)
}

fn init_tracing(cli: &Cli, buffer: Arc<LogBuffer>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file_layer = match &cli.debug_log {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(WindowLayer::new(buffer))
        .with(file_layer)
        .init();
    Ok(())
}

fn run(cli: &Cli, log_buffer: Arc<LogBuffer>) -> Result<()> {
    let hypervisor: Arc<dyn Hypervisor> = Arc::new(VirshAdapter::new());
    let cache = SamplingCache::new(
        hypervisor.clone(),
        Box::new(ProcSystemInfo::new()),
    )
    .context("querying the hypervisor; is virsh available?")?;
    let balloon = BallooningController::new(
        BallooningParams::default(),
        Arc::new(SystemClock),
    );

    let _terminal = TerminalGuard::new().context("initializing terminal")?;
    let (width, height) = TerminalGuard::size()?;

    let queue = Arc::new(EventQueue::new());
    let mut app = App::new(
        queue.clone(),
        hypervisor,
        cache,
        balloon,
        log_buffer,
        width,
        height,
    );

    let _keyboard = spawn_keyboard_reader(&queue);
    sigwinch::spawn_resize_bridge(&queue)?;
    timer::spawn_timer(
        &queue,
        Duration::from_secs(cli.interval.max(1)),
        App::tick,
    );

    tracing::info!("ballast {} started", env!("CARGO_PKG_VERSION"));
    // First sample before the first timer tick fires.
    queue.submit(App::tick);

    queue.run_loop(&mut app, App::handle_event)?;
    Ok(())
}
