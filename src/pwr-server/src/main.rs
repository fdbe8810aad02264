// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use pwr_app::{init_logging, normalize_name};
use pwr_backend::{register_builtin_backends_on, RegistrationContext};
use pwr_core::clock::{now_epoch_millis, remaining_until};
use pwr_core::policies::FixedDelay;
use pwr_core::DynResult;

use pwr_server::config::ServerConfig;
use pwr_server::job_store::ScheduledJobStore;
use pwr_server::lifecycle::{run_lifecycle, supervise, NodeSettings};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - GPIO power node daemon");
const SHUTDOWN_GRACE: Duration = Duration::from_millis(400);

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// List scheduled jobs in the job store and exit
    #[arg(long = "list-jobs")]
    list_jobs: bool,
    /// Node id as known by the home server
    #[arg(short = 'n', long = "node-id", env = "NODE_ID")]
    node_id: Option<String>,
    /// Home server address (host:port or URL)
    #[arg(short = 's', long = "server-url", env = "SERVER_URL")]
    server_url: Option<String>,
    /// Message broker host
    #[arg(short = 'q', long = "queue-host", env = "RMQ_IP")]
    queue_host: Option<String>,
    /// Drive real GPIO lines instead of logging
    #[arg(long = "production", env = "IS_PROD", value_parser = BoolishValueParser::new())]
    production: Option<bool>,
}

/// Merge CLI and environment overrides into the file configuration.
fn apply_overrides(cli: &Cli, cfg: &mut ServerConfig) {
    if let Some(ref id) = cli.node_id {
        cfg.node.id = id.clone();
    }
    if let Some(ref url) = cli.server_url {
        cfg.server.url = url.clone();
    }
    if let Some(ref host) = cli.queue_host {
        cfg.queue.host = host.clone();
    }
    if let Some(production) = cli.production {
        cfg.node.production = production;
    }
}

fn list_jobs(cfg: &ServerConfig) -> DynResult<()> {
    if !cfg.store.path.exists() {
        println!("No job store at {}", cfg.store.path.display());
        return Ok(());
    }
    let store = ScheduledJobStore::read_only(&cfg.store.path)?;
    let now = now_epoch_millis();
    let jobs = store.pending();
    if jobs.is_empty() {
        println!("No scheduled jobs");
    }
    for job in jobs {
        let left = remaining_until(job.fire_at_ms, now);
        println!(
            "pin {:>4}  fires at {}  ({} ms left)",
            job.pin,
            job.fire_at_ms,
            left.as_millis()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_combined_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ServerConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    apply_overrides(&cli, &mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    if cli.list_jobs {
        return list_jobs(&cfg);
    }

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let mut registry = RegistrationContext::new();
    register_builtin_backends_on(&mut registry);
    let backend = normalize_name(&cfg.backend_name());
    if !registry.is_backend_registered(&backend) {
        return Err(format!(
            "Unknown GPIO backend: {} (available: {})",
            backend,
            registry.registered_backends().join(", ")
        )
        .into());
    }

    let settings = NodeSettings::from_config(&cfg);
    info!(
        "Starting pwr-server (node: {}, server: {}, broker: {}, backend: {})",
        settings.node_id, settings.server_url, cfg.queue.host, backend
    );

    let registry = Arc::new(registry);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let policy = FixedDelay::new(settings.restart_delay);
    let supervisor = tokio::spawn(async move {
        supervise(&policy, shutdown_rx, |rx| {
            run_lifecycle(&settings, &registry, rx)
        })
        .await;
    });

    wait_for_signal().await?;
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    if !supervisor.is_finished() {
        supervisor.abort();
    }
    if let Err(e) = supervisor.await {
        if !e.is_cancelled() {
            error!("Supervisor task failed: {}", e);
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> DynResult<()> {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            info!("Ctrl+C received, shutting down");
        }
        _ = term.recv() => info!("SIGTERM received, shutting down"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> DynResult<()> {
    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    Ok(())
}
