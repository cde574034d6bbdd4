//! File-based backing store for persistent storage.

use crate::backend::KvBackend;
use crate::error::{StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// A file-based key-value backend.
///
/// Each key is stored as one file under a root directory. Values survive
/// process restarts.
///
/// # Durability
///
/// `set` writes the value to a temporary file in the same directory, syncs
/// it, and then atomically renames it over the target. A crash mid-write
/// never leaves a torn value behind: readers see either the old value or
/// the new one.
///
/// # Keys
///
/// Keys are used directly as file names, so they must be non-empty and
/// consist of ASCII alphanumerics, `-`, `_`, or `.` (and must not start
/// with a dot). Anything else is rejected with [`StorageError::InvalidKey`].
///
/// # Example
///
/// ```no_run
/// use tagstore_storage::{KvBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("data")).unwrap();
/// backend.set("tags", b"{}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Opens a file backend rooted at the given directory, creating it
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the root directory of the backend.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_key(key, "key must not be empty"));
    }
    if key.starts_with('.') {
        return Err(StorageError::invalid_key(key, "key must not start with a dot"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(StorageError::invalid_key(
            key,
            "key may only contain ASCII alphanumerics, '-', '_', or '.'",
        ));
    }
    Ok(())
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut value = Vec::new();
        file.read_to_end(&mut value)?;
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> StorageResult<()> {
        let path = self.key_path(key)?;
        let tmp_path = self.root.join(format!(".{key}.tmp"));

        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(value)?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &path)?;

        // Durability of the rename itself requires the directory entry to
        // hit disk as well.
        if let Ok(dir) = File::open(&self.root) {
            let _ = dir.sync_all();
        }

        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_set_then_get() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path()).unwrap();

        backend.set("tags", b"{\"t1\":1}").unwrap();
        assert_eq!(backend.get("tags").unwrap(), Some(b"{\"t1\":1}".to_vec()));
    }

    #[test]
    fn file_get_missing() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("missing").unwrap(), None);
    }

    #[test]
    fn file_set_replaces() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path()).unwrap();

        backend.set("k", b"old").unwrap();
        backend.set("k", b"new").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn file_remove() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path()).unwrap();

        backend.set("k", b"v").unwrap();
        backend.remove("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);

        // Removing again is a no-op.
        assert!(backend.remove("k").is_ok());
    }

    #[test]
    fn file_persistence_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let mut backend = FileBackend::open(dir.path()).unwrap();
            backend.set("pages", b"persistent").unwrap();
        }

        {
            let backend = FileBackend::open(dir.path()).unwrap();
            assert_eq!(backend.get("pages").unwrap(), Some(b"persistent".to_vec()));
        }
    }

    #[test]
    fn file_get_multiple() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path()).unwrap();

        backend.set("a", b"1").unwrap();
        backend.set("c", b"3").unwrap();

        let values = backend.get_multiple(&["a", "b", "c"]).unwrap();
        assert_eq!(values.len(), 2);
        assert!(!values.contains_key("b"));
    }

    #[test]
    fn file_rejects_bad_keys() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path()).unwrap();

        assert!(matches!(
            backend.set("", b"v"),
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(
            backend.set("../escape", b"v"),
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(
            backend.get(".hidden"),
            Err(StorageError::InvalidKey { .. })
        ));
    }

    #[test]
    fn file_no_tmp_left_behind() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path()).unwrap();

        backend.set("k", b"v").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["k".to_string()]);
    }
}
