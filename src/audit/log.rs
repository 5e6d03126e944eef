//! Append-only signature event log.
//!
//! Every event is written to the local store first and then mirrored to the
//! backend. The local store is the source of truth: a failed remote write
//! is logged and left for [`SignatureEventLog::sync_local_with_remote`], and
//! never rolls back the local append.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::RemoteAuditSink;
use crate::audit::record::SignatureAuditRecord;
use crate::audit::wire::AuditWireFormat;
use crate::contract::Party;
use crate::error::StoreError;
use crate::store::AuditLogStore;

/// What happened to the signature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignatureEventType {
    Created,
    Cleared,
    Modified,
}

impl SignatureEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Cleared => "cleared",
            Self::Modified => "modified",
        }
    }

    /// Classify an action from the party's previous signature and the newly
    /// captured image.
    pub fn classify(previous: Option<&str>, image: &str) -> Self {
        if image.is_empty() {
            Self::Cleared
        } else if previous.is_some_and(|p| !p.trim().is_empty()) {
            Self::Modified
        } else {
            Self::Created
        }
    }
}

/// One logged signature action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureEventLogEntry {
    #[serde(flatten)]
    pub record: SignatureAuditRecord,
    pub contract_id: Option<String>,
    pub signature_type: Party,
    pub event_type: SignatureEventType,
    pub log_timestamp: DateTime<Utc>,
}

/// Outcome of replaying the local log to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct SignatureEventLog {
    local: Arc<dyn AuditLogStore>,
    remote: Arc<dyn RemoteAuditSink>,
}

impl SignatureEventLog {
    pub fn new(local: Arc<dyn AuditLogStore>, remote: Arc<dyn RemoteAuditSink>) -> Self {
        Self { local, remote }
    }

    /// Append an event locally, then mirror it remotely.
    ///
    /// Only a local store failure is returned as an error.
    pub async fn log_event(
        &self,
        record: SignatureAuditRecord,
        event_type: SignatureEventType,
        contract_id: Option<&str>,
        signature_type: Party,
    ) -> Result<SignatureEventLogEntry, StoreError> {
        let entry = SignatureEventLogEntry {
            record,
            contract_id: contract_id.map(str::to_string),
            signature_type,
            event_type,
            log_timestamp: Utc::now(),
        };

        self.local.append(&entry).await?;
        tracing::debug!(
            contract_id = ?entry.contract_id,
            party = %signature_type,
            event = event_type.as_str(),
            "Signature event appended to local audit log"
        );

        if let Err(e) = self.remote.post_audit(&AuditWireFormat::from(&entry)).await {
            tracing::warn!(
                contract_id = ?entry.contract_id,
                "Remote signature audit write failed, kept locally: {}",
                e
            );
        }

        Ok(entry)
    }

    /// All locally stored entries, unfiltered, in storage order.
    pub async fn get_local_events(&self) -> Result<Vec<SignatureEventLogEntry>, StoreError> {
        self.local.read_all().await
    }

    /// Entries stored by the backend, optionally for one contract.
    ///
    /// Returns an empty list when the backend is unreachable. Rows that
    /// cannot be mapped back are skipped.
    pub async fn get_remote_events(&self, contract_id: Option<&str>) -> Vec<SignatureEventLogEntry> {
        let rows = match self.remote.list_audits(contract_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to fetch remote signature audits: {}", e);
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| match SignatureEventLogEntry::try_from(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping malformed remote audit row: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Replay every local entry to the backend.
    ///
    /// Entries are not deduplicated: each call re-submits the whole local
    /// log, so running it twice submits everything twice. Concurrent calls
    /// are not serialized either.
    pub async fn sync_local_with_remote(&self) -> Result<SyncReport, StoreError> {
        let entries = self.local.read_all().await?;
        let mut report = SyncReport {
            attempted: entries.len(),
            ..SyncReport::default()
        };

        for entry in &entries {
            match self.remote.post_audit(&AuditWireFormat::from(entry)).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        contract_id = ?entry.contract_id,
                        "Failed to sync signature audit entry: {}",
                        e
                    );
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Local signature audit log replayed to backend"
        );
        Ok(report)
    }

    /// Erase the local log. Irreversible.
    pub async fn clear_local(&self) -> Result<(), StoreError> {
        self.local.clear().await?;
        tracing::info!("Local signature audit log cleared");
        Ok(())
    }
}
