//! Hazard Monitor - Main Entry Point
//!
//! Exit status: 0 when the run completed (individual notifications may have
//! failed and will be retried), 1 when the run failed and nothing was committed
//! (the ledger file is unchanged), 2 when configuration or startup failed.

use clap::Parser;
use monitor::settings::MonitorConfig;
use monitor::{build_coordinator, init_logging};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "hazard-monitor",
    version,
    about = "Announce radiation alerts from the vehicle status sheet"
)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, env = "HAZARD_MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// Alert ledger path, overriding the configuration
    #[arg(long)]
    state: Option<PathBuf>,

    /// Log notifications instead of posting them and do not commit the ledger
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match MonitorConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hazard-monitor: configuration error: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Some(state) = cli.state {
        config.state_path = state;
    }

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("hazard-monitor: {:#}", e);
        return ExitCode::from(2);
    }

    info!("=== Hazard Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let coordinator = match build_coordinator(&config, cli.dry_run) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match coordinator.run().await {
        Ok(report) => {
            match serde_json::to_string(&report) {
                Ok(json) => info!(report = %json, "Run report"),
                Err(e) => error!("Failed to serialize run report: {}", e),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run failed, nothing committed: {}", e);
            ExitCode::from(1)
        }
    }
}
