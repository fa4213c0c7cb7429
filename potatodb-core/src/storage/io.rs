// storage/io.rs
// Whole-file read and write of a farm

use serde_json::Value;
use std::fs;

use super::DocumentStore;
use crate::document::Potato;
use crate::error::{Result, StorageError};

impl DocumentStore {
    /// Loads and parses the full file.
    pub fn read(&self) -> Result<Vec<Potato>> {
        let bytes = fs::read(&self.path).map_err(|source| self.io_error(source))?;

        let value: Value = serde_json::from_slice(&bytes).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let items = match value {
            Value::Array(items) => items,
            _ => return Err(self.malformed("expected a JSON array of potatoes").into()),
        };

        let potatoes = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                Potato::from_value(item)
                    .ok_or_else(|| self.malformed(&format!("element {} is not an object", index)))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        log::trace!("read {} potatoes from {}", potatoes.len(), self.path.display());
        Ok(potatoes)
    }

    /// Serializes the full sequence and overwrites the file in one write.
    pub fn write(&self, potatoes: &[Potato]) -> Result<()> {
        let bytes = serde_json::to_vec(potatoes).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })?;

        fs::write(&self.path, bytes).map_err(|source| self.io_error(source))?;

        log::trace!("wrote {} potatoes to {}", potatoes.len(), self.path.display());
        Ok(())
    }

    fn malformed(&self, reason: &str) -> StorageError {
        StorageError::Malformed {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}
