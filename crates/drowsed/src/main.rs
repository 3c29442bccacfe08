//! Drowse Daemon - managed server telemetry
//!
//! Samples the resource usage of the process tree, accumulates it into
//! segments and reports each segment to the collector.

use anyhow::Result;
use clap::Parser;
use drowse_common::{config_path, DrowseConfig, VERSION};
use drowsed::daemon::Daemon;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drowsed")]
#[command(about = "Drowse daemon - process tree sampler and telemetry reporter", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value_os_t = config_path())]
    config: PathBuf,

    /// Send a single report and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = DrowseConfig::load(&cli.config);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();

    info!("[BOOT] Drowse Daemon v{} starting...", VERSION);

    if config.ensure_instance_id() {
        info!("[BOOT] Generated instance id {}", config.instance.id);
        if let Err(e) = config.save(&cli.config) {
            warn!("[BOOT] Could not persist instance id to {}: {}", cli.config.display(), e);
        }
    }

    let mut daemon = Daemon::new(config);
    // the lifecycle controller runs the server alongside the daemon
    daemon.clock().mark_started();

    if let Some(mut listener) = daemon.take_report_listener() {
        tokio::spawn(async move {
            while listener.recv().await {
                debug!("[REPORT] Collector exchange finished");
            }
        });
    }

    if cli.once {
        let reply = daemon.report_once().await?;
        info!("[REPORT] Collector replied: {}", reply.result);
        return Ok(());
    }

    daemon.run().await
}
