//! Result persistence for recurring jobs
//!
//! A small filesystem seam so the scheduler can be exercised against
//! temporary directories in tests. Writes are small PNG blobs; the disk
//! implementation stays synchronous and is only ever called from the
//! scheduler loop.

use crate::Result;
use std::fs;
use std::path::Path;

/// Filesystem operations the scheduler needs for result persistence.
pub trait ResultStore: Send + Sync {
    /// Create the directory if it does not exist (idempotent).
    fn ensure_dir(&self, dir: &Path) -> Result<()>;

    /// Write one result blob.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// File names (not paths) directly inside `dir`.
    fn list(&self, dir: &Path) -> Result<Vec<String>>;

    /// Delete one result file.
    fn remove(&self, path: &Path) -> Result<()>;
}

/// `ResultStore` over the real filesystem.
pub struct DiskStore;

impl ResultStore for DiskStore {
    fn ensure_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        Ok(())
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::write(path, bytes)?;
        Ok(())
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }
}
