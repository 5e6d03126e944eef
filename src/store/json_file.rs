//! File-backed key/value document standing in for browser local storage.
//!
//! The file holds one JSON object. The event log lives under
//! [`LOCAL_STORAGE_KEY`] as a JSON *string* containing the serialized array,
//! the same shape a browser's `localStorage` would hold. Other keys in the
//! document are preserved untouched.
//!
//! An event array that no longer decodes is moved to a
//! `signatureAuditLogs.corrupt-<ts>` key on the next append. A file that is
//! not a JSON object at all is renamed to `<file>.corrupt-<ts>` instead.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::audit::SignatureEventLogEntry;
use crate::error::StoreError;
use crate::store::{
    AuditLogStore, DecodedLog, LOCAL_STORAGE_KEY, corrupt_backup_key, corrupt_suffix,
    decode_entries,
};

pub struct JsonFileAuditLogStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileAuditLogStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    async fn load_document(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Backend(format!(
                "{} does not hold a key/value document",
                self.path.display()
            ))),
        }
    }

    /// Write via temp file + rename so a crash never leaves half a document.
    async fn save_document(&self, doc: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }
        let body = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    /// Load the document for a write. A document that does not parse is
    /// renamed aside and replaced by an empty one.
    async fn load_document_for_write(&self) -> Result<Map<String, Value>, StoreError> {
        match self.load_document().await {
            Ok(doc) => Ok(doc),
            Err(e @ (StoreError::Serialization(_) | StoreError::Backend(_))) => {
                let mut backup = self.path.clone().into_os_string();
                backup.push(format!(".{}", corrupt_suffix()));
                let backup = PathBuf::from(backup);
                tracing::warn!(
                    "{} is unreadable ({}), moving it to {}",
                    self.path.display(),
                    e,
                    backup.display()
                );
                tokio::fs::rename(&self.path, &backup)
                    .await
                    .map_err(|e| self.io_error(e))?;
                Ok(Map::new())
            }
            Err(e) => Err(e),
        }
    }

    fn entries_from(doc: &Map<String, Value>) -> DecodedLog {
        match doc.get(LOCAL_STORAGE_KEY) {
            None | Some(Value::Null) => DecodedLog::default(),
            Some(Value::String(raw)) => decode_entries(raw),
            // Documents written with the array inlined, or any other value.
            Some(other) => decode_entries(&other.to_string()),
        }
    }
}

#[async_trait]
impl AuditLogStore for JsonFileAuditLogStore {
    async fn append(&self, entry: &SignatureEventLogEntry) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load_document_for_write().await?;
        let DecodedLog {
            mut entries,
            corrupt,
        } = Self::entries_from(&doc);
        if let Some(raw) = corrupt {
            doc.insert(corrupt_backup_key(), Value::String(raw));
        }
        entries.push(entry.clone());
        doc.insert(
            LOCAL_STORAGE_KEY.to_string(),
            Value::String(serde_json::to_string(&entries)?),
        );
        self.save_document(&doc).await
    }

    async fn read_all(&self) -> Result<Vec<SignatureEventLogEntry>, StoreError> {
        let doc = self.load_document().await?;
        Ok(Self::entries_from(&doc).entries)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load_document().await?;
        if doc.remove(LOCAL_STORAGE_KEY).is_some() {
            self.save_document(&doc).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::test_support::sample_entry;

    #[tokio::test]
    async fn entries_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("local-storage.json");

        let first = sample_entry("c-1", "data:image/png;base64,AAAA");
        let second = sample_entry("c-2", "");
        {
            let store = JsonFileAuditLogStore::new(&path);
            store.append(&first).await.unwrap();
            store.append(&second).await.unwrap();
        }

        let reopened = JsonFileAuditLogStore::new(&path);
        assert_eq!(reopened.read_all().await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileAuditLogStore::new(dir.path().join("absent.json"));
        assert!(store.read_all().await.unwrap().is_empty());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn clear_keeps_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local-storage.json");
        std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = JsonFileAuditLogStore::new(&path);
        store
            .append(&sample_entry("c-1", "data:image/png;base64,AAAA"))
            .await
            .unwrap();
        store.clear().await.unwrap();

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["theme"], "dark");
        assert!(doc.get(LOCAL_STORAGE_KEY).is_none());
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupted_log_is_backed_up_and_appends_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local-storage.json");
        std::fs::write(&path, r#"{"signatureAuditLogs":"[{oops","theme":"dark"}"#).unwrap();

        let store = JsonFileAuditLogStore::new(&path);
        assert!(store.read_all().await.unwrap().is_empty());

        let entry = sample_entry("c-1", "data:image/png;base64,AAAA");
        store.append(&entry).await.unwrap();
        assert_eq!(store.read_all().await.unwrap(), vec![entry]);

        let doc: Map<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let backups: Vec<_> = doc
            .iter()
            .filter(|(k, _)| k.starts_with("signatureAuditLogs.corrupt-"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].1, "[{oops");
        assert_eq!(doc["theme"], "dark");
    }

    #[tokio::test]
    async fn inlined_array_is_still_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local-storage.json");
        let entry = sample_entry("c-1", "");
        let doc = serde_json::json!({ (LOCAL_STORAGE_KEY): [entry.clone()] });
        std::fs::write(&path, doc.to_string()).unwrap();

        let store = JsonFileAuditLogStore::new(&path);
        assert_eq!(store.read_all().await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn unparsable_file_is_moved_aside_on_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local-storage.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let store = JsonFileAuditLogStore::new(&path);
        assert!(store.read_all().await.is_err());

        store
            .append(&sample_entry("c-1", "data:image/png;base64,AAAA"))
            .await
            .unwrap();
        assert_eq!(store.read_all().await.unwrap().len(), 1);

        let moved: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("local-storage.json.corrupt-"))
            .collect();
        assert_eq!(moved.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(&moved[0])).unwrap(),
            "[1, 2"
        );
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileAuditLogStore::new(dir.path().join("ls.json")));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .append(&sample_entry(&format!("c-{i}"), "data:image/png;base64,AAAA"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.read_all().await.unwrap().len(), 8);
    }
}
