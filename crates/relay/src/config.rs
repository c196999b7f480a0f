//! Relay Configuration
//!
//! The configuration document is read once at startup and validated into
//! immutable runtime types before any alert is processed.

use alerting::{AlertError, CooldownConfig, CooldownSettings};
use config::{Config, File, FileFormat};
use notifier::PushoverConfig;
use schedule::{ScheduleError, ScheduleResolver, ScheduleSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to parse schedule section: {0}")]
    ScheduleSection(#[from] serde_json::Error),

    #[error("Invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Invalid cooldown: {0}")]
    Cooldown(#[from] AlertError),

    #[error("Unknown log level \"{0}\"")]
    LogLevel(String),
}

/// `source` section of the configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Address the JSON-lines listener binds to
    pub listen_addr: String,
}

/// The configuration document as written on disk
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub pushover: PushoverConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub log_level: Option<String>,
    /// Emit logs as JSON objects instead of text
    #[serde(default)]
    pub log_json: bool,
    /// Read separately by [`schedule_section`] so window and channel
    /// names keep their case
    #[serde(skip)]
    pub schedule: Option<ScheduleSettings>,
    #[serde(default)]
    pub cooldown: Option<CooldownSettings>,
}

#[derive(Deserialize)]
struct ScheduleDocument {
    #[serde(default)]
    schedule: Option<ScheduleSettings>,
}

/// The `schedule` section, parsed without key normalization
///
/// `config` lowercases map keys, which would break case-sensitive window
/// names and channel ids.
fn schedule_section(text: &str) -> Result<Option<ScheduleSettings>, ConfigError> {
    let document: ScheduleDocument = serde_json::from_str(text)?;
    Ok(document.schedule)
}

/// Validated runtime settings derived from [`AppConfig`]
#[derive(Debug)]
pub struct RelaySettings {
    pub log_level: Level,
    pub log_json: bool,
    pub schedule: Option<ScheduleResolver>,
    pub cooldown: Option<CooldownConfig>,
}

impl AppConfig {
    /// Load the JSON document at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a JSON document held in memory
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Json))
            .build()?;
        let mut app: AppConfig = config.try_deserialize()?;
        app.schedule = schedule_section(text)?;
        Ok(app)
    }

    /// Configured log level (default: info)
    pub fn log_level(&self) -> Result<Level, ConfigError> {
        match self.log_level.as_deref() {
            None => Ok(Level::INFO),
            Some(raw) => raw
                .parse::<Level>()
                .map_err(|_| ConfigError::LogLevel(raw.to_string())),
        }
    }

    /// Check cross-references and build the runtime policies
    pub fn validate(&self) -> Result<RelaySettings, ConfigError> {
        let schedule = self
            .schedule
            .as_ref()
            .map(ScheduleResolver::new)
            .transpose()?;

        let cooldown = self
            .cooldown
            .clone()
            .map(CooldownConfig::try_from)
            .transpose()?;

        Ok(RelaySettings {
            log_level: self.log_level()?,
            log_json: self.log_json,
            schedule,
            cooldown,
        })
    }
}
