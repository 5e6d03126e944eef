use std::time::Duration;

use crate::config::helpers::{optional_env, parse_bool_env, parse_optional_env, require_positive};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Signing-time telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub ip_lookup_enabled: bool,
    pub ip_lookup_url: String,
    pub geolocation_timeout_ms: u64,
    pub page_url: String,
}

impl TelemetryConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let ip_lookup_enabled = parse_bool_env("BROKERDESK_IP_LOOKUP_ENABLED")?
            .unwrap_or(settings.telemetry.ip_lookup_enabled);

        let ip_lookup_url = optional_env("BROKERDESK_IP_LOOKUP_URL")?
            .unwrap_or_else(|| settings.telemetry.ip_lookup_url.clone());
        if ip_lookup_enabled && url::Url::parse(&ip_lookup_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "BROKERDESK_IP_LOOKUP_URL".to_string(),
                message: format!("'{ip_lookup_url}' is not a valid URL"),
            });
        }

        let geolocation_timeout_ms = parse_optional_env(
            "BROKERDESK_GEOLOCATION_TIMEOUT_MS",
            "a positive integer",
        )?
        .unwrap_or(settings.telemetry.geolocation_timeout_ms);

        let page_url = optional_env("BROKERDESK_PAGE_URL")?
            .or_else(|| settings.telemetry.page_url.clone())
            .unwrap_or_else(|| "brokerdesk://cli/sign".to_string());

        Ok(Self {
            ip_lookup_enabled,
            ip_lookup_url,
            geolocation_timeout_ms: require_positive(
                "BROKERDESK_GEOLOCATION_TIMEOUT_MS",
                geolocation_timeout_ms,
            )?,
            page_url,
        })
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }
}
