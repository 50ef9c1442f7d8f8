use std::fs;
use std::path::{Path, PathBuf};

use derecho_primitives::{DerechoError, Version};

use crate::DurableStore;

/// Stores each version as its own file, named by version number, inside a
/// per-prefix directory under `root`. Adequate for a single-process
/// deployment; a production store would batch these into a log file or a
/// key-value engine, but the one-file-per-version layout keeps `trim` and
/// `truncate` a directory scan instead of a compaction.
pub struct FileDurableStore {
    root: PathBuf,
}

impl FileDurableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileDurableStore { root: root.into() }
    }

    fn prefix_dir(&self, prefix: &str) -> PathBuf {
        self.root.join(prefix)
    }

    fn version_path(&self, prefix: &str, version: Version) -> PathBuf {
        self.prefix_dir(prefix).join(version.0.to_string())
    }
}

impl DurableStore for FileDurableStore {
    fn persist(&self, prefix: &str, version: Version, bytes: &[u8]) -> Result<(), DerechoError> {
        let dir = self.prefix_dir(prefix);
        fs::create_dir_all(&dir).map_err(|e| DerechoError::StorageFailure(e.to_string()))?;
        fs::write(self.version_path(prefix, version), bytes)
            .map_err(|e| DerechoError::StorageFailure(e.to_string()))?;
        tracing::trace!(prefix, version = version.0, "persisted version to disk");
        Ok(())
    }

    fn load(&self, prefix: &str, version: Version) -> Result<Option<Vec<u8>>, DerechoError> {
        match fs::read(self.version_path(prefix, version)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DerechoError::StorageFailure(e.to_string())),
        }
    }

    fn trim(&self, prefix: &str, up_to: Version) -> Result<(), DerechoError> {
        for_each_version_file(&self.prefix_dir(prefix), |path, version| {
            if version <= up_to.0 {
                let _ = fs::remove_file(path);
            }
        })
    }

    fn truncate(&self, prefix: &str, above: Version) -> Result<(), DerechoError> {
        for_each_version_file(&self.prefix_dir(prefix), |path, version| {
            if version > above.0 {
                let _ = fs::remove_file(path);
            }
        })
    }
}

fn for_each_version_file(
    dir: &Path,
    mut f: impl FnMut(PathBuf, i64),
) -> Result<(), DerechoError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(DerechoError::StorageFailure(e.to_string())),
    };
    for entry in entries {
        let entry = entry.map_err(|e| DerechoError::StorageFailure(e.to_string()))?;
        let path = entry.path();
        if let Some(version) =
            path.file_name().and_then(|n| n.to_str()).and_then(|n| n.parse::<i64>().ok())
        {
            f(path, version);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_load_trim_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDurableStore::new(dir.path());
        for v in 1..=5 {
            store.persist("field-a", Version(v), format!("v{v}").as_bytes()).unwrap();
        }
        assert_eq!(store.load("field-a", Version(3)).unwrap(), Some(b"v3".to_vec()));

        store.trim("field-a", Version(2)).unwrap();
        assert_eq!(store.load("field-a", Version(1)).unwrap(), None);
        assert_eq!(store.load("field-a", Version(2)).unwrap(), None);
        assert!(store.load("field-a", Version(3)).unwrap().is_some());

        store.truncate("field-a", Version(4)).unwrap();
        assert!(store.load("field-a", Version(4)).unwrap().is_some());
        assert_eq!(store.load("field-a", Version(5)).unwrap(), None);
    }

    #[test]
    fn load_of_missing_prefix_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDurableStore::new(dir.path());
        assert_eq!(store.load("never-written", Version(1)).unwrap(), None);
    }
}
