//! Core DocStore implementation

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::StoreError;

/// Current Unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A typed document stored under a well-known file key.
///
/// Documents are whole-unit: `save` replaces the entire file, `load` reads it
/// back. There are no partial updates.
pub trait Record: Serialize + DeserializeOwned {
    /// Unique identifier for this document
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds)
    fn updated_at(&self) -> i64;

    /// Well-known file key, e.g. "tree.json"
    fn file_key() -> &'static str;
}

/// Statistics for a project directory
#[derive(Debug, Clone)]
pub struct ProjectStats {
    /// Number of paths under the project
    pub path_count: usize,
    /// Number of documents across all paths
    pub doc_count: usize,
    /// Total bytes stored
    pub total_bytes: u64,
}

/// Whole-document JSON store keyed by `(project, path, file)`.
///
/// Layout on disk:
///
/// ```text
/// .docstore/
/// └── {project}/
///     ├── .lock
///     └── {path}/
///         ├── tree.json
///         ├── completions.json
///         └── context.json
/// ```
///
/// Writes are atomic (temp file + rename) and serialized per project via an
/// advisory lock on `{project}/.lock`. Concurrent writers are last-writer-wins;
/// the store assumes at most one active writer per project/path at a time.
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open or create a store rooted at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StoreError::Io {
            path: root.display().to_string(),
            source: e,
        })?;
        debug!(root = %root.display(), "Opened doc store");
        Ok(Self { root })
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a document, or None if it does not exist
    pub fn load(&self, project: &str, path: &str, file: &str) -> Result<Option<Value>, StoreError> {
        let doc_path = self.doc_path(project, path, file);
        debug!(doc = %doc_path.display(), "load: called");

        if !doc_path.exists() {
            debug!(doc = %doc_path.display(), "load: not found");
            return Ok(None);
        }

        let content = fs::read_to_string(&doc_path).map_err(|e| StoreError::Io {
            path: doc_path.display().to_string(),
            source: e,
        })?;

        let value: Value = serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: doc_path.display().to_string(),
            source: e,
        })?;

        Ok(Some(value))
    }

    /// Save a document, replacing any previous content
    ///
    /// The write is atomic: content goes to a temp file in the same directory
    /// and is renamed into place while holding the project lock.
    pub fn save(&self, project: &str, path: &str, file: &str, value: &Value) -> Result<(), StoreError> {
        let doc_path = self.doc_path(project, path, file);
        debug!(doc = %doc_path.display(), "save: called");

        let parent = doc_path.parent().expect("doc path always has a parent");
        fs::create_dir_all(parent).map_err(|e| StoreError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;

        let _lock = self.lock_project(project)?;

        let content = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;

        let tmp_path = doc_path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| StoreError::Io {
            path: tmp_path.display().to_string(),
            source: e,
        })?;
        fs::rename(&tmp_path, &doc_path).map_err(|e| StoreError::Io {
            path: doc_path.display().to_string(),
            source: e,
        })?;

        debug!(doc = %doc_path.display(), "save: written");
        Ok(())
    }

    /// Delete a document; returns true if it existed
    pub fn delete(&self, project: &str, path: &str, file: &str) -> Result<bool, StoreError> {
        let doc_path = self.doc_path(project, path, file);
        debug!(doc = %doc_path.display(), "delete: called");

        if !doc_path.exists() {
            return Ok(false);
        }

        let _lock = self.lock_project(project)?;
        fs::remove_file(&doc_path).map_err(|e| StoreError::Io {
            path: doc_path.display().to_string(),
            source: e,
        })?;
        Ok(true)
    }

    /// List `(path, file)` pairs stored under a project
    pub fn list(&self, project: &str) -> Result<Vec<(String, String)>, StoreError> {
        let project_dir = self.root.join(sanitize_key(project));
        debug!(project_dir = %project_dir.display(), "list: called");

        let mut entries = Vec::new();
        if !project_dir.exists() {
            return Ok(entries);
        }

        for path_entry in read_dir(&project_dir)? {
            if !path_entry.is_dir() {
                continue;
            }
            let path_name = file_name(&path_entry);
            for file_entry in read_dir(&path_entry)? {
                if file_entry.extension().map(|e| e == "json").unwrap_or(false) {
                    entries.push((path_name.clone(), file_name(&file_entry)));
                }
            }
        }

        entries.sort();
        Ok(entries)
    }

    /// Gather statistics for a project
    pub fn stats(&self, project: &str) -> Result<ProjectStats, StoreError> {
        let project_dir = self.root.join(sanitize_key(project));

        let mut paths: HashMap<String, ()> = HashMap::new();
        let mut doc_count = 0usize;
        let mut total_bytes = 0u64;

        if project_dir.exists() {
            for path_entry in read_dir(&project_dir)? {
                if !path_entry.is_dir() {
                    continue;
                }
                paths.insert(file_name(&path_entry), ());
                for file_entry in read_dir(&path_entry)? {
                    if file_entry.extension().map(|e| e == "json").unwrap_or(false) {
                        doc_count += 1;
                        if let Ok(meta) = fs::metadata(&file_entry) {
                            total_bytes += meta.len();
                        }
                    }
                }
            }
        }

        Ok(ProjectStats {
            path_count: paths.len(),
            doc_count,
            total_bytes,
        })
    }

    /// Load a typed document
    pub fn load_record<R: Record>(&self, project: &str, path: &str) -> Result<Option<R>, StoreError> {
        match self.load(project, path, R::file_key())? {
            Some(value) => {
                let record = serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
                    path: format!("{}/{}/{}", project, path, R::file_key()),
                    source: e,
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Save a typed document
    pub fn save_record<R: Record>(&self, project: &str, path: &str, record: &R) -> Result<(), StoreError> {
        let value = serde_json::to_value(record).map_err(StoreError::Serialize)?;
        info!(
            id = %record.id(),
            file = R::file_key(),
            "Persisting document"
        );
        self.save(project, path, R::file_key(), &value)
    }

    /// Resolve the on-disk path for a document
    fn doc_path(&self, project: &str, path: &str, file: &str) -> PathBuf {
        let file = if file.ends_with(".json") {
            file.to_string()
        } else {
            format!("{}.json", file)
        };
        self.root
            .join(sanitize_key(project))
            .join(sanitize_key(path))
            .join(sanitize_key(&file))
    }

    /// Take the advisory lock for a project, creating the lock file if needed
    fn lock_project(&self, project: &str) -> Result<ProjectLock, StoreError> {
        let project_dir = self.root.join(sanitize_key(project));
        fs::create_dir_all(&project_dir).map_err(|e| StoreError::Io {
            path: project_dir.display().to_string(),
            source: e,
        })?;

        let lock_path = project_dir.join(".lock");
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::Io {
                path: lock_path.display().to_string(),
                source: e,
            })?;

        lock_file.lock_exclusive().map_err(|e| StoreError::Lock {
            path: lock_path.display().to_string(),
            source: e,
        })?;

        Ok(ProjectLock { file: lock_file })
    }
}

/// Held advisory lock; released on drop
struct ProjectLock {
    file: fs::File,
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Sanitize a key for use as a path component
///
/// Keeps alphanumerics, `-`, `_`, and `.`; replaces everything else with `-`.
/// Prevents path traversal via `..` or separators in caller-supplied keys.
fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();

    // ".." would escape the store root
    if cleaned.chars().all(|c| c == '.') {
        "-".to_string()
    } else {
        cleaned
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        paths.push(entry.path());
    }
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let doc = json!({"goal": "learn spanish", "availableDepth": 3});
        store.save("proj-1", "spanish", "tree.json", &doc).unwrap();

        let loaded = store.load("proj-1", "spanish", "tree.json").unwrap();
        assert_eq!(loaded, Some(doc));
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let loaded = store.load("proj-1", "spanish", "tree.json").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.save("p", "x", "doc", &json!({"a": 1, "b": 2})).unwrap();
        store.save("p", "x", "doc", &json!({"a": 3})).unwrap();

        let loaded = store.load("p", "x", "doc").unwrap().unwrap();
        assert_eq!(loaded, json!({"a": 3}));
        assert!(loaded.get("b").is_none());
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.save("p", "x", "doc", &json!({})).unwrap();
        assert!(store.delete("p", "x", "doc").unwrap());
        assert!(!store.delete("p", "x", "doc").unwrap());
        assert!(store.load("p", "x", "doc").unwrap().is_none());
    }

    #[test]
    fn test_list() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.save("p", "spanish", "tree", &json!({})).unwrap();
        store.save("p", "spanish", "context", &json!({})).unwrap();
        store.save("p", "guitar", "tree", &json!({})).unwrap();

        let entries = store.list("p").unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&("spanish".to_string(), "tree.json".to_string())));
        assert!(entries.contains(&("guitar".to_string(), "tree.json".to_string())));
    }

    #[test]
    fn test_sanitize_key_blocks_traversal() {
        assert_eq!(sanitize_key("../../etc"), "..-..-etc");
        assert!(!sanitize_key("../up").contains('/'));
        assert_eq!(sanitize_key(".."), "-");
        assert_eq!(sanitize_key("my project"), "my-project");
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let doc_dir = dir.path().join("p").join("x");
        fs::create_dir_all(&doc_dir).unwrap();
        fs::write(doc_dir.join("tree.json"), "not json").unwrap();

        let result = store.load("p", "x", "tree.json");
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct TestDoc {
        id: String,
        updated_at: i64,
        payload: String,
    }

    impl Record for TestDoc {
        fn id(&self) -> &str {
            &self.id
        }

        fn updated_at(&self) -> i64 {
            self.updated_at
        }

        fn file_key() -> &'static str {
            "test.json"
        }
    }

    #[test]
    fn test_typed_record_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let doc = TestDoc {
            id: "doc-1".to_string(),
            updated_at: now_ms(),
            payload: "hello".to_string(),
        };
        store.save_record("p", "x", &doc).unwrap();

        let loaded: TestDoc = store.load_record("p", "x").unwrap().unwrap();
        assert_eq!(loaded.id, "doc-1");
        assert_eq!(loaded.payload, "hello");
    }
}
