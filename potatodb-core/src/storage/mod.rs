// storage/mod.rs
// One farm = one JSON file holding an array of potatoes

mod io;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

/// Whole-file storage of a single farm. Holds nothing but the path: every
/// read goes back to disk and every write replaces the full file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        DocumentStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes an empty array if the file is missing, or unconditionally when
    /// `overwrite` is set.
    pub fn initialize(&self, overwrite: bool) -> Result<()> {
        if overwrite || !self.exists() {
            log::debug!("initializing farm file {}", self.path.display());
            fs::write(&self.path, b"[]").map_err(|source| self.io_error(source))?;
        }
        Ok(())
    }

    /// Deletes the backing file.
    pub fn remove(&self) -> Result<()> {
        log::debug!("removing farm file {}", self.path.display());
        fs::remove_file(&self.path).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    pub(crate) fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
