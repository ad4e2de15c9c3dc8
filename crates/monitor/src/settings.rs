//! Monitor configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional file,
//! then `HAZARD_MONITOR_*` environment variables (`__` separates nested keys,
//! e.g. `HAZARD_MONITOR_RUN__SEND_TIMEOUT_SECS=5`).

use coordinator::RunConfig;
use row_normalizer::NormalizerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the status rows come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Sheets {
        #[serde(default)]
        spreadsheet_id: String,
        #[serde(default = "default_range")]
        range: String,
        /// Service account key file; used unless `api_key` is set
        #[serde(default = "default_service_account_key")]
        service_account_key: PathBuf,
        #[serde(default)]
        api_key: Option<String>,
    },
    JsonFile {
        path: PathBuf,
    },
}

fn default_range() -> String {
    "A:Z".to_string()
}

fn default_service_account_key() -> PathBuf {
    PathBuf::from("service_account.json")
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Sheets {
            spreadsheet_id: String::new(),
            range: default_range(),
            service_account_key: default_service_account_key(),
            api_key: None,
        }
    }
}

/// Where notices are posted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    Bluesky {
        #[serde(default = "default_bluesky_service")]
        service: String,
        /// `BLUESKY_USERNAME` / `BLUESKY_PASSWORD` JSON file
        #[serde(default = "default_credentials_path")]
        credentials_path: PathBuf,
    },
    Log,
}

fn default_bluesky_service() -> String {
    notifier::BlueskyConfig::default().service
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("secrets/credentials.json")
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Bluesky {
            service: default_bluesky_service(),
            credentials_path: default_credentials_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `coordinator=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Alert ledger location
    pub state_path: PathBuf,
    /// Age after which a leftover run lock is taken over (seconds)
    pub stale_lock_secs: u64,
    pub normalizer: NormalizerConfig,
    pub run: RunConfig,
    pub source: SourceConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("state/alert-state.json"),
            stale_lock_secs: 3600,
            normalizer: NormalizerConfig::default(),
            run: RunConfig::default(),
            source: SourceConfig::default(),
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HAZARD_MONITOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if let SourceConfig::Sheets { spreadsheet_id, .. } = &self.source {
            if spreadsheet_id.trim().is_empty() {
                return Err(config::ConfigError::Message(
                    "source.spreadsheet_id must be set for the sheets source".to_string(),
                ));
            }
        }
        if self.normalizer.hazard_keyword.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "normalizer.hazard_keyword must not be empty".to_string(),
            ));
        }
        if self.run.fetch_timeout_secs == 0 || self.run.send_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "run timeouts must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
