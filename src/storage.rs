//! Per-item scratch space for uploaded images and their derived variants.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::error::StorageError;

/// A scratch area holding one item's source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempHandle {
    pub dir: PathBuf,
    pub source: PathBuf,
}

impl TempHandle {
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// Location for a file derived from the source, inside the same area.
    pub fn derived_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }
}

pub trait Storage: Send + Sync {
    fn write_temp(&self, name: &str, bytes: &[u8]) -> Result<TempHandle, StorageError>;
    fn release(&self, handle: TempHandle) -> Result<(), StorageError>;
}

/// Releases its handle when dropped, whichever way the item's processing ends.
pub struct ScopedTemp<'s> {
    storage: &'s dyn Storage,
    handle: TempHandle,
}

impl<'s> ScopedTemp<'s> {
    pub fn acquire(
        storage: &'s dyn Storage,
        name: &str,
        bytes: &[u8],
    ) -> Result<Self, StorageError> {
        let handle = storage.write_temp(name, bytes)?;
        Ok(Self { storage, handle })
    }

    pub fn handle(&self) -> &TempHandle {
        &self.handle
    }
}

impl Drop for ScopedTemp<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.storage.release(self.handle.clone()) {
            warn!(
                dir = %self.handle.dir.display(),
                error = %err,
                "failed to release temporary storage"
            );
        }
    }
}

/// Stores each item in its own uniquely named directory under `root`.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl Storage for DiskStorage {
    fn write_temp(&self, name: &str, bytes: &[u8]) -> Result<TempHandle, StorageError> {
        let id = Uuid::new_v4();
        let dir = self.root.join(id.to_string());
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        // Keep only the final component so names cannot escape the area.
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let source = dir.join(format!("{id}_{file_name}"));
        if let Err(err) = fs::write(&source, bytes) {
            let _ = fs::remove_dir_all(&dir);
            return Err(io_error(&source, err));
        }

        debug!(path = %source.display(), bytes = bytes.len(), "stored upload");
        Ok(TempHandle { dir, source })
    }

    fn release(&self, handle: TempHandle) -> Result<(), StorageError> {
        match fs::remove_dir_all(&handle.dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&handle.dir, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scoped_temp_removes_area_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(root.path().to_path_buf());

        let dir = {
            let scoped = ScopedTemp::acquire(&storage, "scan.png", b"bytes").unwrap();
            let handle = scoped.handle();
            assert_eq!(fs::read(handle.source_path()).unwrap(), b"bytes");
            assert!(handle.derived_path("enhanced.png").starts_with(&handle.dir));
            handle.dir.clone()
        };

        assert!(!dir.exists());
    }

    #[test]
    fn names_cannot_escape_the_area() {
        let root = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(root.path().to_path_buf());

        let handle = storage.write_temp("../../etc/evil.png", b"x").unwrap();
        assert!(handle.source.starts_with(&handle.dir));
        assert!(handle
            .source
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_evil.png"));
        storage.release(handle).unwrap();
    }

    #[test]
    fn releasing_twice_is_harmless() {
        let root = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(root.path().to_path_buf());
        let handle = storage.write_temp("a.jpg", b"x").unwrap();
        storage.release(handle.clone()).unwrap();
        storage.release(handle).unwrap();
    }
}
