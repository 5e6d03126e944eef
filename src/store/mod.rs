//! Local durable store for the signature event log.
//!
//! The local store is authoritative: entries land here before any remote
//! write is attempted, and the remote copy is only eventually consistent.
//! All backends keep the log as a single JSON array under
//! [`LOCAL_STORAGE_KEY`], grow without bound, and never evict.

mod json_file;
#[cfg(feature = "libsql")]
mod libsql;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::audit::SignatureEventLogEntry;
use crate::config::{AuditStoreBackend, AuditStoreConfig};
use crate::error::StoreError;

pub use self::json_file::JsonFileAuditLogStore;
#[cfg(feature = "libsql")]
pub use self::libsql::LibSqlAuditLogStore;
pub use self::memory::MemoryAuditLogStore;

/// Key under which the event array is stored.
pub const LOCAL_STORAGE_KEY: &str = "signatureAuditLogs";

/// Append-only local log of signature events.
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    /// Append one entry at the end of the log.
    async fn append(&self, entry: &SignatureEventLogEntry) -> Result<(), StoreError>;

    /// Every entry in storage order.
    async fn read_all(&self) -> Result<Vec<SignatureEventLogEntry>, StoreError>;

    /// Remove every entry. Irreversible.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Open the store selected by configuration.
pub async fn open_store(config: &AuditStoreConfig) -> Result<Arc<dyn AuditLogStore>, StoreError> {
    match config.backend {
        AuditStoreBackend::JsonFile => {
            tracing::debug!("Using JSON audit store at {}", config.path.display());
            Ok(Arc::new(JsonFileAuditLogStore::new(&config.path)))
        }
        AuditStoreBackend::Memory => {
            tracing::warn!("Using in-memory audit store; events are lost on exit");
            Ok(Arc::new(MemoryAuditLogStore::new()))
        }
        #[cfg(feature = "libsql")]
        AuditStoreBackend::LibSql => {
            tracing::debug!("Using libSQL audit store at {}", config.path.display());
            Ok(Arc::new(LibSqlAuditLogStore::new_local(&config.path).await?))
        }
        #[cfg(not(feature = "libsql"))]
        AuditStoreBackend::LibSql => Err(StoreError::Backend(
            "libsql audit store requested but the `libsql` feature is disabled".to_string(),
        )),
    }
}

/// Stored event array after decoding.
#[derive(Debug, Default)]
pub(crate) struct DecodedLog {
    pub entries: Vec<SignatureEventLogEntry>,
    /// Raw value that did not decode. Writers move it under
    /// [`corrupt_backup_key`] before replacing it.
    pub corrupt: Option<String>,
}

/// Parse the stored array value.
///
/// An undecodable value reads as an empty log so a damaged local copy never
/// stops a signature from being recorded.
pub(crate) fn decode_entries(raw: &str) -> DecodedLog {
    if raw.trim().is_empty() {
        return DecodedLog::default();
    }
    match serde_json::from_str(raw) {
        Ok(entries) => DecodedLog {
            entries,
            corrupt: None,
        },
        Err(e) => {
            tracing::warn!(
                "Stored {} value is unreadable, continuing from an empty log: {}",
                LOCAL_STORAGE_KEY,
                e
            );
            DecodedLog {
                entries: Vec::new(),
                corrupt: Some(raw.to_string()),
            }
        }
    }
}

/// Suffix for data moved aside after a failed decode, e.g.
/// `corrupt-20261016T093000123Z`.
pub(crate) fn corrupt_suffix() -> String {
    format!("corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%3fZ"))
}

/// Key that keeps an undecodable event array next to the live one.
pub(crate) fn corrupt_backup_key() -> String {
    format!("{LOCAL_STORAGE_KEY}.{}", corrupt_suffix())
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;

    use crate::audit::record::{DeviceInfo, SessionInfo, SignatureData};
    use crate::audit::{SignatureAuditRecord, SignatureEventLogEntry, SignatureEventType};
    use crate::contract::Party;

    pub(crate) fn sample_entry(contract_id: &str, image: &str) -> SignatureEventLogEntry {
        SignatureEventLogEntry {
            record: SignatureAuditRecord {
                timestamp: Utc::now(),
                ip_address: Some("192.0.2.10".to_string()),
                user_agent: "Mozilla/5.0".to_string(),
                device_info: DeviceInfo {
                    platform: "Windows".to_string(),
                    browser: "Edge".to_string(),
                    browser_version: "120.0".to_string(),
                    screen_resolution: "1366x768".to_string(),
                    timezone: "America/Sao_Paulo".to_string(),
                    language: "pt-BR".to_string(),
                },
                session_info: SessionInfo {
                    session_id: "sess".to_string(),
                    page_url: "https://backoffice.example.com/sign".to_string(),
                    referrer: String::new(),
                },
                signature_data: SignatureData::from_image(image, 400, 200),
                extended: None,
            },
            contract_id: Some(contract_id.to_string()),
            signature_type: Party::Client,
            event_type: SignatureEventType::classify(None, image),
            log_timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_value_decodes_to_empty_log() {
        for raw in ["", "  ", "[]"] {
            let decoded = decode_entries(raw);
            assert!(decoded.entries.is_empty());
            assert!(decoded.corrupt.is_none());
        }
    }

    #[test]
    fn unreadable_value_degrades_to_empty_and_keeps_raw_text() {
        let decoded = decode_entries("{broken");
        assert!(decoded.entries.is_empty());
        assert_eq!(decoded.corrupt.as_deref(), Some("{broken"));

        let key = corrupt_backup_key();
        assert!(key.starts_with("signatureAuditLogs.corrupt-"));
        assert_ne!(key, LOCAL_STORAGE_KEY);
    }

    #[tokio::test]
    async fn open_store_memory_backend() {
        let store = open_store(&AuditStoreConfig {
            backend: AuditStoreBackend::Memory,
            path: std::path::PathBuf::from("/unused"),
        })
        .await
        .unwrap();
        assert!(store.read_all().await.unwrap().is_empty());
    }
}
