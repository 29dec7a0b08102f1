use super::backend::StorageBackend;
use crate::error::{NotepadError, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// In-memory storage backend for testing.
///
/// Uses an `RwLock` because the backend is shared with drive adapters that
/// run on async tasks.
#[derive(Default)]
pub struct MemBackend {
    docs: RwLock<BTreeMap<String, String>>,
    simulate_write_error: AtomicBool,
    writes: AtomicUsize,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(NotepadError::Store("Simulated write error".to_string()));
        }
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        docs.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        docs.remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::StorageBackendExt;

    #[test]
    fn test_read_write_remove() {
        let backend = MemBackend::new();
        assert_eq!(backend.read("a").unwrap(), None);
        backend.write("a", "1").unwrap();
        assert_eq!(backend.read("a").unwrap().as_deref(), Some("1"));
        backend.remove("a").unwrap();
        backend.remove("a").unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_keys_by_prefix_sorted() {
        let backend = MemBackend::new();
        backend.write("tasks/deltas/2", "").unwrap();
        backend.write("tasks/board", "").unwrap();
        backend.write("tasks/deltas/1", "").unwrap();
        backend.write("ui/tasks", "").unwrap();
        assert_eq!(
            backend.keys("tasks/deltas/").unwrap(),
            vec!["tasks/deltas/1", "tasks/deltas/2"]
        );
        assert_eq!(backend.keys("").unwrap().len(), 4);
    }

    #[test]
    fn test_simulated_write_error() {
        let backend = MemBackend::new();
        backend.set_simulate_write_error(true);
        assert!(backend.write("a", "1").is_err());
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn test_json_helpers() {
        let backend = MemBackend::new();
        backend.write_json("n", &vec![1, 2, 3]).unwrap();
        let back: Option<Vec<u32>> = backend.read_json("n").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
        let missing: Option<Vec<u32>> = backend.read_json("x").unwrap();
        assert!(missing.is_none());
    }
}
