use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Abstract interface for raw storage I/O.
///
/// The substrate is a flat key/value space of JSON documents. Keys use `/` to
/// group related documents (`drive/items/working/<id>`, `tasks/deltas/<stamp>`).
/// Backends handle the "how" (memory vs filesystem); the item store, drive
/// adapters, autosave queue and task service decide the "what".
///
/// Every method takes `&self`: backends are shared between the item store and
/// the local drive adapter, and used from async tasks.
pub trait StorageBackend: Send + Sync {
    /// Read the document at `key`. `Ok(None)` means it does not exist.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the document at `key`.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the document at `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Typed helpers over any backend.
pub trait StorageBackendExt: StorageBackend {
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.write(key, &raw)
    }
}

impl<B: StorageBackend + ?Sized> StorageBackendExt for B {}
