//! User settings persistence.
//!
//! Stores operator preferences in `~/.brokerdesk/config.toml`.
//! Settings are resolved with env var > config.toml > default priority.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Supported local audit store backends.
pub const SUPPORTED_AUDIT_STORES: [&str; 3] = ["json", "libsql", "memory"];

/// Normalize audit store aliases to canonical values used across config/runtime.
pub fn normalize_audit_store(value: &str) -> Option<String> {
    let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");

    match normalized.as_str() {
        "json" | "json_file" | "local_storage" => Some("json".to_string()),
        "libsql" | "sqlite" | "turso" => Some("libsql".to_string()),
        "memory" | "in_memory" => Some("memory".to_string()),
        _ => None,
    }
}

/// Operator settings persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Backend REST API settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// Signing telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetrySettings,

    /// Local audit log store settings.
    #[serde(default)]
    pub audit_store: AuditStoreSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSettings {
    /// Backend base URL, e.g. `https://backoffice.example.com`.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_ms: default_api_timeout_ms(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_api_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySettings {
    /// Whether the best-effort public IP lookup runs at signing time.
    #[serde(default = "default_true")]
    pub ip_lookup_enabled: bool,

    /// Public IP lookup endpoint returning `{"ip": "..."}`.
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    /// Upper bound for the geolocation reading.
    #[serde(default = "default_geolocation_timeout_ms")]
    pub geolocation_timeout_ms: u64,

    /// Page URL recorded in session info for signatures captured here.
    #[serde(default)]
    pub page_url: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            ip_lookup_enabled: true,
            ip_lookup_url: default_ip_lookup_url(),
            geolocation_timeout_ms: default_geolocation_timeout_ms(),
            page_url: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ip_lookup_url() -> String {
    "https://api.ipify.org?format=json".to_string()
}

fn default_geolocation_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditStoreSettings {
    /// Store backend: "json", "libsql", or "memory".
    #[serde(default = "default_audit_store_backend")]
    pub backend: String,

    /// Store file path override.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditStoreSettings {
    fn default() -> Self {
        Self {
            backend: default_audit_store_backend(),
            path: None,
        }
    }
}

fn default_audit_store_backend() -> String {
    "json".to_string()
}

impl Settings {
    /// Default TOML config file path (~/.brokerdesk/config.toml).
    pub fn default_toml_path() -> PathBuf {
        crate::bootstrap::brokerdesk_base_dir().join("config.toml")
    }

    /// Load settings from a TOML file.
    ///
    /// Returns `None` if the file doesn't exist. Returns an error only
    /// if the file exists but can't be parsed.
    pub fn load_toml(path: &std::path::Path) -> Result<Option<Self>, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };

        let mut settings: Self = toml::from_str(&data)
            .map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))?;
        settings.sanitize_audit_store();
        Ok(Some(settings))
    }

    /// Merge values from `other` that differ from the defaults.
    ///
    /// Used to overlay a TOML file on top of already-loaded settings
    /// without clobbering values the file leaves at their defaults.
    pub fn merge_from(&mut self, other: &Self) {
        let default_json = match serde_json::to_value(Self::default()) {
            Ok(v) => v,
            Err(_) => return,
        };
        let other_json = match serde_json::to_value(other) {
            Ok(v) => v,
            Err(_) => return,
        };
        let mut self_json = match serde_json::to_value(&*self) {
            Ok(v) => v,
            Err(_) => return,
        };

        merge_non_default(&mut self_json, &other_json, &default_json);

        if let Ok(merged) = serde_json::from_value(self_json) {
            *self = merged;
            self.sanitize_audit_store();
        }
    }

    fn sanitize_audit_store(&mut self) {
        match normalize_audit_store(&self.audit_store.backend) {
            Some(canonical) => self.audit_store.backend = canonical,
            None => {
                tracing::warn!(
                    "Unknown audit store backend '{}' in settings, falling back to json",
                    self.audit_store.backend
                );
                self.audit_store.backend = default_audit_store_backend();
            }
        }
    }
}

fn merge_non_default(
    target: &mut serde_json::Value,
    other: &serde_json::Value,
    defaults: &serde_json::Value,
) {
    match (target, other, defaults) {
        (
            serde_json::Value::Object(t),
            serde_json::Value::Object(o),
            serde_json::Value::Object(d),
        ) => {
            for (key, other_val) in o {
                let default_val = d.get(key).cloned().unwrap_or(serde_json::Value::Null);
                if let Some(target_val) = t.get_mut(key) {
                    merge_non_default(target_val, other_val, &default_val);
                } else if other_val != &default_val {
                    t.insert(key.clone(), other_val.clone());
                }
            }
        }
        (target, other, defaults) => {
            if other != defaults {
                *target = other.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::settings::*;

    #[test]
    fn default_toml_path_under_brokerdesk() {
        let path = Settings::default_toml_path();
        assert!(path.to_string_lossy().contains(".brokerdesk"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn missing_toml_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_toml(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn toml_overlay_keeps_unrelated_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "https://backoffice.example.com"

[audit_store]
backend = "SQLite"
"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        settings.telemetry.ip_lookup_enabled = false;

        let overlay = Settings::load_toml(&path).unwrap().unwrap();
        settings.merge_from(&overlay);

        assert_eq!(settings.api.base_url, "https://backoffice.example.com");
        assert_eq!(settings.api.timeout_ms, 10_000);
        assert_eq!(settings.audit_store.backend, "libsql");
        assert!(!settings.telemetry.ip_lookup_enabled);
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nbase_url = 3").unwrap();
        let err = Settings::load_toml(&path).unwrap_err();
        assert!(err.contains("invalid TOML"));
    }

    #[test]
    fn audit_store_aliases_normalize() {
        assert_eq!(normalize_audit_store("local-storage").as_deref(), Some("json"));
        assert_eq!(normalize_audit_store(" Turso ").as_deref(), Some("libsql"));
        assert_eq!(normalize_audit_store("in memory").as_deref(), Some("memory"));
        assert_eq!(normalize_audit_store("redis"), None);
    }
}
