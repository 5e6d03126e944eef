use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::audit::SignatureEventLogEntry;
use crate::error::StoreError;
use crate::store::AuditLogStore;

/// In-memory audit store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryAuditLogStore {
    entries: RwLock<Vec<SignatureEventLogEntry>>,
}

impl MemoryAuditLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLogStore for MemoryAuditLogStore {
    async fn append(&self, entry: &SignatureEventLogEntry) -> Result<(), StoreError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<SignatureEventLogEntry>, StoreError> {
        Ok(self.entries.read().await.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
