//! smsq Daemon - SMS dispatch across ModemManager modems
//!
//! This binary discovers modems through `mmcli`, keeps them enabled, and
//! dispatches outbound SMS through a bounded queue and a pool of workers.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (or ~/.config/smsq/smsqd.toml if present)
//! smsqd
//!
//! # Run with an explicit configuration file
//! smsqd --config /etc/smsq/smsqd.toml
//! SMSQ_CONFIG=/etc/smsq/smsqd.toml smsqd
//!
//! # Run without touching hardware
//! smsqd --dry-run
//!
//! # Enable debug logging
//! RUST_LOG=smsqd=debug smsqd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown. Queued messages are still sent.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use smsq_mmcli::{DryRunModemManager, Mmcli, ModemManager};
use smsqd::config::Config;
use smsqd::pipeline::{Pipeline, PipelineSettings};
use smsqd::shutdown::Shutdown;
use smsqd::source::StaticMessageSource;

/// smsq daemon - dispatches SMS across attached modems
#[derive(Parser, Debug)]
#[command(name = "smsqd", version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log sends instead of driving real modems
    #[arg(long)]
    dry_run: bool,
}

/// Resolves the configuration file: flag, then `SMSQ_CONFIG`, then the
/// per-user default if it exists.
fn config_path(args: &Args) -> Option<PathBuf> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }
    if let Ok(path) = env::var("SMSQ_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("smsq").join("smsqd.toml"))
        .filter(|path| path.exists())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path = config_path(&args);
    let config = Config::load_or_default(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Invalid default configuration".to_string(),
    })?;

    run_daemon(config, args.dry_run)
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: Config, dry_run: bool) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("smsqd=info".parse()?)
                .add_directive("smsq_mmcli=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        dry_run,
        queue_capacity = config.queue_capacity,
        worker_count = config.worker_count,
        "smsq daemon starting"
    );

    let manager: Arc<dyn ModemManager> = if dry_run {
        Arc::new(DryRunModemManager::new())
    } else {
        Arc::new(Mmcli::new(config.mmcli_path.clone()).with_post_send_delay(config.post_send_delay()))
    };
    let source = Arc::new(StaticMessageSource::new(config.source_message()?));

    let shutdown = Shutdown::new();
    tokio::spawn(trigger_on_signal(shutdown.clone()));

    let pipeline = Pipeline::new(PipelineSettings::from(&config), manager, source, shutdown);
    let report = pipeline.run().await;

    if let Err(e) = &report.discovery {
        info!(error = %e, "Modem discovery had stopped before shutdown");
    }
    info!(
        enqueued = report.produced.enqueued,
        dropped = report.produced.dropped,
        source_failures = report.produced.source_failures,
        sent = report.workers.sent,
        failed = report.workers.failed,
        drained = report.workers.drained,
        "Shutdown complete"
    );
    Ok(())
}

/// Fires `shutdown` on the first SIGINT/SIGTERM.
///
/// If the handlers cannot be installed the daemon would be unstoppable
/// except by SIGKILL, so shutdown is triggered right away instead.
async fn trigger_on_signal(shutdown: Shutdown) {
    match next_termination_signal().await {
        Ok(signal) => info!(signal, "Signal received, draining dispatch queue"),
        Err(e) => error!(error = %e, "Cannot listen for termination signals, stopping"),
    }
    shutdown.trigger();
}

/// Resolves with the name of the first termination signal delivered.
#[cfg(unix)]
async fn next_termination_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn next_termination_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
