use super::{DriveAdapter, DriveWrite, WriteOutcome, DRIVE_PREFIX};
use crate::error::Result;
use crate::store::{StorageBackend, StorageBackendExt};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

pub const LOCAL_DRIVE: &str = "local";

/// The authoritative drive: documents land in the storage backend under
/// `drive/<path>`.
pub struct LocalDrive<B: StorageBackend> {
    backend: Arc<B>,
}

impl<B: StorageBackend> Clone for LocalDrive<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: StorageBackend> LocalDrive<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn write_now(&self, write: &DriveWrite) -> Result<()> {
        let key = write.storage_key();
        self.backend.write_json(&key, &write.json)?;
        debug!(key = %key, "local drive write");
        Ok(())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.backend.read_json(&format!("{}{}", DRIVE_PREFIX, path))
    }

    /// Paths (without the `drive/` prefix) starting with `prefix`.
    pub fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let keys = self.backend.keys(&format!("{}{}", DRIVE_PREFIX, prefix))?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(DRIVE_PREFIX).map(str::to_string))
            .collect())
    }

    pub fn remove(&self, path: &str) -> Result<()> {
        self.backend.remove(&format!("{}{}", DRIVE_PREFIX, path))
    }
}

#[async_trait]
impl<B: StorageBackend + 'static> DriveAdapter for LocalDrive<B> {
    fn name(&self) -> &str {
        LOCAL_DRIVE
    }

    async fn write(&self, write: &DriveWrite) -> WriteOutcome {
        match self.write_now(write) {
            Ok(()) => WriteOutcome::Ok,
            Err(err) => WriteOutcome::failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemBackend;
    use serde_json::{json, Value};

    #[test]
    fn test_write_read_keys_remove() {
        let drive = LocalDrive::new(Arc::new(MemBackend::new()));
        drive
            .write_now(&DriveWrite::new("a", json!({"n": 1})).at("tasks/deltas/one"))
            .unwrap();
        drive
            .write_now(&DriveWrite::new("b", json!({"n": 2})).at("tasks/board"))
            .unwrap();

        let value: Value = drive.read_json("tasks/deltas/one").unwrap().unwrap();
        assert_eq!(value["n"], 1);
        assert_eq!(drive.keys("tasks/deltas/").unwrap(), vec!["tasks/deltas/one"]);

        drive.remove("tasks/deltas/one").unwrap();
        assert!(drive.keys("tasks/deltas/").unwrap().is_empty());
        assert!(drive.read_json::<Value>("tasks/deltas/one").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_adapter_reports_backend_failure() {
        let backend = Arc::new(MemBackend::new());
        let drive = LocalDrive::new(backend.clone());
        backend.set_simulate_write_error(true);
        let outcome = drive.write(&DriveWrite::new("x", json!(null))).await;
        assert!(!outcome.is_ok());
    }
}
