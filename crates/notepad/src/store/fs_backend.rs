use super::backend::StorageBackend;
use crate::error::{NotepadError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DOC_EXT: &str = ".json";

/// Filesystem backend: one JSON file per key.
///
/// `/` in a key becomes a directory separator, so `tasks/deltas/x` lives at
/// `<root>/tasks/deltas/x.json`. Key segments are sanitized; anything outside
/// `[A-Za-z0-9._-]` becomes `_` and `..` can never escape the root.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sanitize_segment(segment: &str) -> String {
        let cleaned: String = segment
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.chars().all(|c| c == '.') {
            cleaned.replace('.', "_")
        } else {
            cleaned
        }
    }

    /// Map a key to its file path.
    pub fn doc_path(&self, key: &str) -> Result<PathBuf> {
        let segments: Vec<String> = key
            .split('/')
            .filter(|s| !s.is_empty())
            .map(Self::sanitize_segment)
            .collect();
        let Some((last, dirs)) = segments.split_last() else {
            return Err(NotepadError::Store(format!("Invalid storage key: {:?}", key)));
        };
        let mut path = self.root.clone();
        for dir in dirs {
            path.push(dir);
        }
        path.push(format!("{}{}", last, DOC_EXT));
        Ok(path)
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(NotepadError::Io)?;
        }
        Ok(())
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(NotepadError::Io)?;
        for entry in entries {
            let path = entry.map_err(NotepadError::Io)?.path();
            if path.is_dir() {
                self.collect_keys(&path, keys)?;
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let Some(relative) = relative.to_str() else {
                continue;
            };
            // In-flight temp files end in `.part` and are skipped here.
            if let Some(stem) = relative.strip_suffix(DOC_EXT) {
                keys.push(stem.replace(std::path::MAIN_SEPARATOR, "/"));
            }
        }
        Ok(())
    }
}

impl StorageBackend for FsBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.doc_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(NotepadError::Io)?;
        Ok(Some(content))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let target = self.doc_path(key)?;
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        self.ensure_dir(&dir)?;

        // Atomic Write
        let tmp_path = dir.join(format!(".tmp-{}.part", Uuid::new_v4()));
        fs::write(&tmp_path, value).map_err(NotepadError::Io)?;
        fs::rename(&tmp_path, &target).map_err(NotepadError::Io)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.doc_path(key)?;
        if path.exists() {
            fs::remove_file(path).map_err(NotepadError::Io)?;
        }
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}
