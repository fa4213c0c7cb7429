// potatodb-core/src/lib.rs
// File-backed JSON document farms - pure Rust API

pub mod database;
pub mod document;
pub mod error;
pub mod farm;
pub mod find_options;
pub mod potato_array;
pub mod query;
pub mod stamp;
pub mod storage;
pub mod update;
pub mod value;

// Public exports
pub use database::{DatabaseOptions, PotatoDb};
pub use document::{Potato, PotatoId, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
pub use error::{PotatoError, Result, StorageError};
pub use farm::{Farm, FarmOptions};
pub use find_options::{FindOptions, Sort, SortOrder};
pub use potato_array::PotatoArray;
pub use query::{Query, QueryOperator, Test};
pub use stamp::Stamper;
pub use storage::DocumentStore;
pub use update::{Update, UpdateOperator};
