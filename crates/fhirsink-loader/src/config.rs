//! Layered configuration: optional TOML file plus `FHIRSINK__`-prefixed
//! environment overrides, validated eagerly at startup.

use clap::ValueEnum;
use config::{Config, Environment, File};
use fhirsink_db_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub storage: PostgresConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding bundle `.json` files.
    pub dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("synthea/output/fhir"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// What to do with a bundle whose input is corrupt.
    pub on_error: ErrorPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

/// Run policy for bundles that fail to map: strictness by default,
/// resilience as an explicit operator choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Abort the whole run on the first corrupt bundle.
    #[default]
    Abort,
    /// Skip the corrupt bundle and keep loading the rest.
    Continue,
}

impl AppConfig {
    /// Loads configuration from an optional file plus the environment.
    ///
    /// Without an explicit path, a `fhirsink.toml` in the working directory
    /// is used if present. Environment variables use double underscores for
    /// nesting, e.g. `FHIRSINK__STORAGE__PASSWORD`.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("fhirsink").required(false)),
        };
        builder = builder.add_source(Environment::with_prefix("FHIRSINK").separator("__"));
        builder.build()?.try_deserialize()
    }

    /// Rejects an unusable configuration before any work starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.source.dir.as_os_str().is_empty() {
            return Err("source.dir must not be empty".into());
        }
        self.storage.validate()?;
        let level = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&level.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}
