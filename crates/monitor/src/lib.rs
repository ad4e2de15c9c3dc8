//! Hazard Monitor
//!
//! Wires the configured source, transport and state store into a
//! `RunCoordinator` for one scheduled run.

pub mod settings;

use crate::settings::{LogFormat, LoggingConfig, MonitorConfig, SourceConfig, TransportConfig};
use anyhow::{bail, Context};
use coordinator::RunCoordinator;
use notifier::{BlueskyConfig, BlueskyCredentials, BlueskyTransport, LogTransport, Transport};
use sheet_source::{
    DataSource, JsonFileSource, ServiceAccountKey, SheetsAuth, SheetsConfig, SheetsSource,
};
use std::sync::Arc;
use std::time::Duration;
use storage::JsonFileStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("invalid log level '{}'", config.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {}", e))
}

/// Build the coordinator for one run. A dry run posts to the log and
/// leaves the ledger untouched.
pub fn build_coordinator(config: &MonitorConfig, dry_run: bool) -> anyhow::Result<RunCoordinator> {
    let store = JsonFileStore::new(&config.state_path)
        .with_stale_lock_after(Duration::from_secs(config.stale_lock_secs));

    let source = build_source(&config.source)?;

    let transport: Arc<dyn Transport> = if dry_run {
        info!("Dry run: notifications are logged, the ledger is not committed");
        Arc::new(LogTransport)
    } else {
        build_transport(&config.transport)?
    };

    let mut run = config.run.clone();
    if dry_run {
        run.commit = false;
    }

    Ok(RunCoordinator::new(
        Arc::new(store),
        source,
        transport,
        config.normalizer.clone(),
        run,
    ))
}

fn build_source(config: &SourceConfig) -> anyhow::Result<Arc<dyn DataSource>> {
    match config {
        SourceConfig::Sheets {
            spreadsheet_id,
            range,
            service_account_key,
            api_key,
        } => {
            let auth = match api_key {
                Some(key) if !key.is_empty() => SheetsAuth::ApiKey(key.clone()),
                _ => SheetsAuth::ServiceAccount(
                    ServiceAccountKey::from_file(service_account_key)
                        .context("loading Google service account key")?,
                ),
            };
            let source = SheetsSource::new(
                SheetsConfig {
                    spreadsheet_id: spreadsheet_id.clone(),
                    range: range.clone(),
                },
                auth,
            )?;
            Ok(Arc::new(source))
        }
        SourceConfig::JsonFile { path } => Ok(Arc::new(JsonFileSource::new(path))),
    }
}

fn build_transport(config: &TransportConfig) -> anyhow::Result<Arc<dyn Transport>> {
    match config {
        TransportConfig::Bluesky {
            service,
            credentials_path,
        } => {
            let credentials = match (
                std::env::var("BLUESKY_USERNAME"),
                std::env::var("BLUESKY_PASSWORD"),
            ) {
                (Ok(username), Ok(password)) => BlueskyCredentials { username, password },
                _ => BlueskyCredentials::from_file(credentials_path)
                    .context("loading Bluesky credentials")?,
            };
            if credentials.username.trim().is_empty() || credentials.password.is_empty() {
                bail!("Bluesky credentials are incomplete");
            }
            let transport = BlueskyTransport::new(
                BlueskyConfig {
                    service: service.clone(),
                    ..Default::default()
                },
                credentials,
            )?;
            Ok(Arc::new(transport))
        }
        TransportConfig::Log => {
            warn!("Log transport configured: notifications will not be posted");
            Ok(Arc::new(LogTransport))
        }
    }
}
