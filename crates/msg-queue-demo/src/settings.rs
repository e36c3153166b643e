//! Layered settings for the configured receiver.
//!
//! Sources, applied in order (later sources override earlier ones):
//!
//! 1. `<config dir>/appsettings.json` (required)
//! 2. `<config dir>/appsettings.<environment>.json` (optional)
//! 3. Environment variables prefixed `MSG_QUEUE__`, with `__` separating
//!    nested keys, e.g. `MSG_QUEUE__AZURE_SERVICE_BUS__CONNECTION_STRING`
//!
//! The environment name comes from `MSG_QUEUE_ENVIRONMENT` and defaults to
//! `Production`.

use crate::PLACEHOLDER_MARKER;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Variable naming the active environment
pub const ENVIRONMENT_VARIABLE: &str = "MSG_QUEUE_ENVIRONMENT";

/// Environment used when none is named
pub const DEFAULT_ENVIRONMENT: &str = "Production";

/// Prefix of environment variables that override file settings
pub const ENVIRONMENT_PREFIX: &str = "MSG_QUEUE";

/// Base settings file name
pub const BASE_SETTINGS_FILE: &str = "appsettings.json";

/// Settings loading errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Connection string is not configured. Please update appsettings.{environment}.json.")]
    NotConfigured { environment: String },
}

/// Root of the settings tree
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DemoSettings {
    #[serde(default)]
    pub azure_service_bus: ServiceBusSettings,
}

/// `azure_service_bus` section
#[derive(Clone, Default, Deserialize)]
pub struct ServiceBusSettings {
    #[serde(default)]
    pub connection_string: Option<String>,
}

impl fmt::Debug for ServiceBusSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBusSettings")
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Builds [`DemoSettings`] from files and environment variables
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    config_dir: PathBuf,
    environment: String,
    env_source: Option<HashMap<String, String>>,
}

impl SettingsLoader {
    pub fn new(config_dir: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            config_dir: config_dir.into(),
            environment: environment.into(),
            env_source: None,
        }
    }

    /// Read overrides from `variables` instead of the process environment
    pub fn with_env_source(mut self, variables: HashMap<String, String>) -> Self {
        self.env_source = Some(variables);
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load and merge every source
    pub fn load(&self) -> Result<DemoSettings, SettingsError> {
        let base_file = self.config_dir.join(BASE_SETTINGS_FILE);
        if !base_file.is_file() {
            return Err(SettingsError::FileNotFound { path: base_file });
        }

        let environment_file = self
            .config_dir
            .join(format!("appsettings.{}.json", self.environment));
        debug!(
            base = %base_file.display(),
            overlay = %environment_file.display(),
            overlay_present = environment_file.is_file(),
            "Loading settings"
        );

        let environment_source = Environment::with_prefix(ENVIRONMENT_PREFIX)
            .separator("__")
            .source(
                self.env_source
                    .clone()
                    .map(|variables| variables.into_iter().collect()),
            );

        let settings = Config::builder()
            .add_source(
                File::from(base_file.as_path())
                    .format(FileFormat::Json)
                    .required(true),
            )
            .add_source(
                File::from(environment_file.as_path())
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(environment_source)
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}

/// Environment name from `MSG_QUEUE_ENVIRONMENT`, or `Production`
pub fn environment_name() -> String {
    std::env::var(ENVIRONMENT_VARIABLE)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Usable connection string from `settings`
///
/// Blank values and values still holding the `Placeholder` marker are
/// rejected with [`SettingsError::NotConfigured`].
pub fn resolve_connection_string(
    settings: &DemoSettings,
    environment: &str,
) -> Result<String, SettingsError> {
    match settings.azure_service_bus.connection_string.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() && !value.contains(PLACEHOLDER_MARKER) => {
            Ok(value.to_string())
        }
        _ => Err(SettingsError::NotConfigured {
            environment: environment.to_string(),
        }),
    }
}
