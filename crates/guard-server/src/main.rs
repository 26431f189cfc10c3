//! homeguard daemon
//!
//! Loads `homeguard.yaml`, seeds the built-in local host with the configured
//! simulation entities and runs the alarm engine until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use guard_config::{ArmingProfile, GuardConfig};
use guard_core::Host;
use guard_engine::AlarmEngine;
use guard_host::{Clock, HostRuntime, LocalHost};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "homeguard", version, about = "Home security alarm engine")]
struct Cli {
    /// Directory holding homeguard.yaml and secrets.yaml
    #[arg(short, long, env = "HOMEGUARD_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "HOMEGUARD_LOG", default_value = "info")]
    log_level: String,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(true)
        .init();
}

fn load_config(cli: &Cli) -> Result<GuardConfig> {
    let config = GuardConfig::load(&cli.config_dir).with_context(|| {
        format!(
            "failed to load configuration from {}",
            cli.config_dir.display()
        )
    })?;

    let sensors: usize = ArmingProfile::ALL
        .iter()
        .filter_map(|p| config.alarm.groups(*p))
        .flat_map(|groups| groups.values())
        .map(Vec::len)
        .sum();
    info!(
        panel = %config.alarm.panel,
        sensors,
        trackers = config.presence.device_trackers.len(),
        language = ?config.notify.language,
        "Configuration loaded"
    );
    if sensors == 0 {
        warn!("No sensors configured, only buttons and presence will act");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting homeguard");
    let config = load_config(&cli)?;

    let offset = *chrono::Local::now().offset();
    let host = Arc::new(LocalHost::simulated(Clock::system(), offset));
    host.seed(&config.simulation);

    let mut engine =
        AlarmEngine::new(Arc::clone(&host), &config).context("invalid alarm settings")?;
    if cli.check {
        info!("Configuration is valid");
        return Ok(());
    }

    let mut runtime = HostRuntime::new(Arc::clone(&host));
    engine.initialize();
    info!(
        panel = ?host.get_state(&config.alarm.panel).map(|s| s.state),
        "homeguard is running"
    );

    let shutdown = runtime.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
        }
        info!("Shutting down...");
        shutdown.shutdown();
    });

    runtime.run(&mut engine).await;

    engine.terminate();
    runtime.pump(&mut engine);
    info!("homeguard stopped");
    Ok(())
}
