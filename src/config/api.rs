use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_optional_env, require_positive};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Backend REST API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token sent on every backend request, if set.
    pub auth_token: Option<SecretString>,
    pub timeout_ms: u64,
}

impl ApiConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let base_url = optional_env("BROKERDESK_API_BASE_URL")?
            .unwrap_or_else(|| settings.api.base_url.clone());
        let parsed = url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            key: "BROKERDESK_API_BASE_URL".to_string(),
            message: format!("must be an absolute URL: {e}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                key: "BROKERDESK_API_BASE_URL".to_string(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let timeout_ms = parse_optional_env("BROKERDESK_API_TIMEOUT_MS", "a positive integer")?
            .unwrap_or(settings.api.timeout_ms);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: optional_env("BROKERDESK_API_TOKEN")?.map(SecretString::from),
            timeout_ms: require_positive("BROKERDESK_API_TIMEOUT_MS", timeout_ms)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
