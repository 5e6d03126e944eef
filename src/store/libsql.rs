//! libSQL-backed local audit store.
//!
//! Uses a `local_storage(key, value)` table so the on-disk layout matches
//! the key/value model of the JSON store.

use std::path::Path;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase};
use tokio::sync::Mutex;

use crate::audit::SignatureEventLogEntry;
use crate::error::StoreError;
use crate::store::{
    AuditLogStore, DecodedLog, LOCAL_STORAGE_KEY, corrupt_backup_key, decode_entries,
};

/// libSQL audit store.
///
/// Holds a single connection for its lifetime: in-memory databases are
/// connection-local, so reconnecting would lose the log.
pub struct LibSqlAuditLogStore {
    _db: LibSqlDatabase,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlAuditLogStore {
    /// Open (or create) a local embedded database.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to open libSQL database: {}", e)))?;
        Self::init(db).await
    }

    /// Create a new in-memory database (for testing).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Backend(format!("Failed to create in-memory database: {}", e))
            })?;
        Self::init(db).await
    }

    async fn init(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Backend(format!("Failed to create connection: {}", e)))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            (),
        )
        .await?;
        Ok(Self {
            _db: db,
            conn,
            write_lock: Mutex::new(()),
        })
    }

    async fn read_value(&self) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM local_storage WHERE key = ?1",
                libsql::params![LOCAL_STORAGE_KEY],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    async fn write_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO local_storage (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                libsql::params![key, value],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditLogStore for LibSqlAuditLogStore {
    async fn append(&self, entry: &SignatureEventLogEntry) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let DecodedLog {
            mut entries,
            corrupt,
        } = match self.read_value().await? {
            Some(raw) => decode_entries(&raw),
            None => DecodedLog::default(),
        };
        if let Some(raw) = corrupt {
            self.write_value(&corrupt_backup_key(), &raw).await?;
        }
        entries.push(entry.clone());
        self.write_value(LOCAL_STORAGE_KEY, &serde_json::to_string(&entries)?)
            .await
    }

    async fn read_all(&self) -> Result<Vec<SignatureEventLogEntry>, StoreError> {
        match self.read_value().await? {
            Some(raw) => Ok(decode_entries(&raw).entries),
            None => Ok(Vec::new()),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.conn
            .execute(
                "DELETE FROM local_storage WHERE key = ?1",
                libsql::params![LOCAL_STORAGE_KEY],
            )
            .await?;
        Ok(())
    }
}
