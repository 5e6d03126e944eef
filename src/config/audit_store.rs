use std::path::PathBuf;

use crate::config::helpers::optional_env;
use crate::error::ConfigError;
use crate::settings::{SUPPORTED_AUDIT_STORES, Settings, normalize_audit_store};

/// Which local durable store backs the signature event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStoreBackend {
    /// JSON key/value document on disk.
    JsonFile,
    /// Embedded libSQL database.
    LibSql,
    /// Process-local, lost on exit.
    Memory,
}

impl AuditStoreBackend {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match normalize_audit_store(value).as_deref() {
            Some("json") => Ok(Self::JsonFile),
            Some("libsql") => Ok(Self::LibSql),
            Some("memory") => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!(
                    "expected one of {}, got '{value}'",
                    SUPPORTED_AUDIT_STORES.join(", ")
                ),
            }),
        }
    }

    fn default_file_name(self) -> &'static str {
        match self {
            Self::JsonFile | Self::Memory => "local-storage.json",
            Self::LibSql => "local-storage.db",
        }
    }
}

/// Local audit store configuration.
#[derive(Debug, Clone)]
pub struct AuditStoreConfig {
    pub backend: AuditStoreBackend,
    pub path: PathBuf,
}

impl AuditStoreConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let backend = AuditStoreBackend::parse(
            &optional_env("BROKERDESK_AUDIT_STORE")?
                .unwrap_or_else(|| settings.audit_store.backend.clone()),
            "BROKERDESK_AUDIT_STORE",
        )?;

        let path = optional_env("BROKERDESK_AUDIT_STORE_PATH")?
            .map(PathBuf::from)
            .or_else(|| settings.audit_store.path.clone())
            .unwrap_or_else(|| default_audit_store_path(backend));

        Ok(Self { backend, path })
    }
}

fn default_audit_store_path(backend: AuditStoreBackend) -> PathBuf {
    crate::bootstrap::brokerdesk_base_dir()
        .join("audit")
        .join(backend.default_file_name())
}
