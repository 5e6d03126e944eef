//! Configuration for brokerdesk.
//!
//! Settings are loaded with priority: env var > TOML config file > default.
//! `./.env` and `~/.brokerdesk/.env` are loaded via dotenvy before anything
//! else is resolved.

mod api;
mod audit_store;
pub(crate) mod helpers;
mod telemetry;

use crate::error::ConfigError;
use crate::settings::Settings;

pub use self::api::ApiConfig;
pub use self::audit_store::{AuditStoreBackend, AuditStoreConfig};
pub use self::telemetry::TelemetryConfig;

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub telemetry: TelemetryConfig,
    pub audit_store: AuditStoreConfig,
}

impl Config {
    /// Load from env with an optional TOML config file overlay.
    pub fn from_env_with_toml(toml_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        crate::bootstrap::load_brokerdesk_env();
        let mut settings = Settings::default();

        Self::apply_toml_overlay(&mut settings, toml_path)?;

        Self::build(&settings)
    }

    /// Load and merge a TOML config file into settings.
    ///
    /// If `explicit_path` is `Some`, loads from that path (errors are fatal).
    /// If `None`, tries the default path `~/.brokerdesk/config.toml` (missing
    /// file is silently ignored).
    fn apply_toml_overlay(
        settings: &mut Settings,
        explicit_path: Option<&std::path::Path>,
    ) -> Result<(), ConfigError> {
        let path = explicit_path
            .map(std::path::PathBuf::from)
            .unwrap_or_else(Settings::default_toml_path);

        match Settings::load_toml(&path) {
            Ok(Some(toml_settings)) => {
                settings.merge_from(&toml_settings);
                tracing::debug!("Loaded TOML config from {}", path.display());
            }
            Ok(None) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
            }
            Err(e) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Failed to load config file {}: {}",
                        path.display(),
                        e
                    )));
                }
                tracing::warn!("Failed to load default config file: {}", e);
            }
        }
        Ok(())
    }

    /// Build config from settings.
    pub fn build(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            api: ApiConfig::resolve(settings)?,
            telemetry: TelemetryConfig::resolve(settings)?,
            audit_store: AuditStoreConfig::resolve(settings)?,
        })
    }
}
