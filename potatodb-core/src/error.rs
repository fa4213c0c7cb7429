// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PotatoError {
    /// Malformed query/update argument, negative skip, wrong insert arity.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Every I/O or parse failure of a farm file ends up here.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed farm file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl PotatoError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        PotatoError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PotatoError::Validation(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, PotatoError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, PotatoError>;
