// potatodb-core/src/database.rs
// Database = one directory of farm files

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};
use crate::farm::{farm_path, Farm, FarmOptions};
use crate::storage::DocumentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseOptions {
    /// Reset farm files to `[]` even when they already exist.
    pub overwrite: bool,
}

impl DatabaseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Lays out farms as `<root>/<name>/<farm>.json`.
#[derive(Debug, Clone)]
pub struct PotatoDb {
    name: String,
    path: PathBuf,
    options: DatabaseOptions,
    farms: Vec<String>,
}

impl PotatoDb {
    /// Create the database directory (and its root) if missing
    pub fn create<P: AsRef<Path>>(
        root: P,
        name: impl Into<String>,
        options: DatabaseOptions,
    ) -> Result<Self> {
        let name = name.into();
        let path = root.as_ref().join(&name);

        fs::create_dir_all(&path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        log::debug!("opened database '{}' at {}", name, path.display());
        Ok(PotatoDb {
            name,
            path,
            options,
            farms: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> DatabaseOptions {
        self.options
    }

    /// Creates (or reopens) a farm file and returns its handle.
    pub fn create_farm(&mut self, name: &str, options: FarmOptions) -> Result<Farm> {
        let path = farm_path(&self.path, name);
        DocumentStore::new(&path).initialize(self.options.overwrite)?;

        if !self.farms.iter().any(|farm| farm == name) {
            self.farms.push(name.to_string());
        }

        log::debug!("database '{}': farm '{}' ready", self.name, name);
        Ok(Farm::new(name, path, options))
    }

    /// Names of farms created through this handle, in creation order.
    pub fn farms(&self) -> &[String] {
        &self.farms
    }

    /// Removes the database directory and everything in it.
    pub fn drop_database(self) -> Result<()> {
        log::debug!("dropping database '{}'", self.name);
        fs::remove_dir_all(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find_options::FindOptions;
    use crate::query::Test;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_create_lays_out_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("databases");

        let mut db = PotatoDb::create(&root, "Shop", DatabaseOptions::default()).unwrap();
        let farm = db.create_farm("Users", FarmOptions::default()).unwrap();

        assert!(root.join("Shop").is_dir());
        assert_eq!(farm.path(), root.join("Shop").join("Users.json"));
        assert_eq!(fs::read_to_string(farm.path()).unwrap(), "[]");
    }

    #[test]
    fn test_create_farm_keeps_existing_data() {
        let temp = TempDir::new().unwrap();

        let mut db = PotatoDb::create(temp.path(), "Shop", DatabaseOptions::default()).unwrap();
        let farm = db.create_farm("Users", FarmOptions::default()).unwrap();
        farm.insert_one(json!({"name": "kept"})).unwrap();

        let mut reopened = PotatoDb::create(temp.path(), "Shop", DatabaseOptions::default()).unwrap();
        let farm = reopened.create_farm("Users", FarmOptions::default()).unwrap();
        assert_eq!(farm.count_potatoes(Test::all()).unwrap(), 1);

        let options = DatabaseOptions::new().with_overwrite(true);
        let mut reset = PotatoDb::create(temp.path(), "Shop", options).unwrap();
        let farm = reset.create_farm("Users", FarmOptions::default()).unwrap();
        assert!(farm.find_many(Test::all(), &FindOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_farms_listed_once() {
        let temp = TempDir::new().unwrap();
        let mut db = PotatoDb::create(temp.path(), "Shop", DatabaseOptions::default()).unwrap();

        db.create_farm("Users", FarmOptions::default()).unwrap();
        db.create_farm("Posts", FarmOptions::default()).unwrap();
        db.create_farm("Users", FarmOptions::default()).unwrap();

        assert_eq!(db.farms(), &["Users".to_string(), "Posts".to_string()]);
    }

    #[test]
    fn test_drop_database() {
        let temp = TempDir::new().unwrap();
        let mut db = PotatoDb::create(temp.path(), "Shop", DatabaseOptions::default()).unwrap();
        let farm = db.create_farm("Users", FarmOptions::default()).unwrap();
        let path = db.path().to_path_buf();

        db.drop_database().unwrap();

        assert!(!path.exists());
        assert!(farm.find_one(Test::all(), &FindOptions::default()).unwrap_err().is_storage());
    }

    #[test]
    fn test_options_from_config() {
        let options: DatabaseOptions = serde_json::from_str(r#"{"overwrite": true}"#).unwrap();
        assert!(options.overwrite);

        let options: DatabaseOptions = serde_json::from_str("{}").unwrap();
        assert!(!options.overwrite);
    }
}
