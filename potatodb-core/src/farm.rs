// potatodb-core/src/farm.rs
// Farm = one collection of potatoes backed by one JSON file

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::document::Potato;
use crate::error::{PotatoError, Result};
use crate::find_options::{apply_post_stage, apply_pre_stage, FindOptions};
use crate::potato_array::PotatoArray;
use crate::query::{Query, Test};
use crate::stamp::Stamper;
use crate::storage::DocumentStore;
use crate::update::{Update, UpdatePlan};

/// Per-farm stamping flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmOptions {
    /// Stamp inserted potatoes with a random `_id`.
    #[serde(alias = "_id")]
    pub identification: bool,

    /// Stamp `createdAt` on insert and refresh `updatedAt` on updates.
    pub timestamps: bool,
}

impl Default for FarmOptions {
    fn default() -> Self {
        FarmOptions {
            identification: true,
            timestamps: true,
        }
    }
}

impl FarmOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identification(mut self, identification: bool) -> Self {
        self.identification = identification;
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }
}

/// A farm holds a path and its flags, nothing else. Each call re-reads the
/// whole file and each mutation rewrites it; there is no locking, so
/// overlapping writers race and the last write wins.
#[derive(Debug, Clone)]
pub struct Farm {
    name: String,
    store: DocumentStore,
    stamper: Stamper,
}

impl Farm {
    pub fn new<P: AsRef<Path>>(name: impl Into<String>, path: P, options: FarmOptions) -> Self {
        Farm {
            name: name.into(),
            store: DocumentStore::new(path),
            stamper: Stamper::new(options.identification, options.timestamps),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn options(&self) -> FarmOptions {
        FarmOptions {
            identification: self.stamper.identification,
            timestamps: self.stamper.timestamps,
        }
    }

    // ========== FARM OPERATIONS ==========

    /// Deletes the backing file.
    pub fn drop_farm(&self) -> Result<()> {
        log::debug!("dropping farm '{}'", self.name);
        self.store.remove()
    }

    /// Number of potatoes matching `test`.
    pub fn count_potatoes(&self, test: impl Into<Test>) -> Result<usize> {
        Ok(self.find_many(test, &FindOptions::default())?.len())
    }

    pub fn exists(&self, test: impl Into<Test>) -> Result<bool> {
        Ok(self.find_one(test, &FindOptions::default())?.is_some())
    }

    // ========== INSERT ==========

    /// Insert one potato - returns it with its stamps
    pub fn insert_one(&self, potato: impl Into<Value>) -> Result<Potato> {
        let mut potato = match potato.into() {
            Value::Object(map) => Potato::from(map),
            Value::Array(_) => {
                return Err(PotatoError::validation("insertOne() accepts a single potato only"))
            }
            _ => return Err(PotatoError::validation("insertOne() expected a potato object")),
        };

        let mut potatoes = self.store.read()?;
        self.stamper.stamp(&mut potato);
        potatoes.push(potato.clone());
        self.store.write(&potatoes)?;

        log::debug!("farm '{}': inserted 1 potato", self.name);
        Ok(potato)
    }

    /// Insert many potatoes, in order
    pub fn insert_many(&self, potatoes: impl Into<Value>) -> Result<PotatoArray> {
        let items = match potatoes.into() {
            Value::Array(items) => items,
            _ => {
                return Err(PotatoError::validation(
                    "insertMany() accepts an array of potatoes only",
                ))
            }
        };

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let mut potato = Potato::from_value(item)
                .ok_or_else(|| PotatoError::validation("insertMany() expected potato objects"))?;
            self.stamper.stamp(&mut potato);
            inserted.push(potato);
        }

        let mut stored = self.store.read()?;
        stored.extend(inserted.iter().cloned());
        self.store.write(&stored)?;

        log::debug!("farm '{}': inserted {} potatoes", self.name, inserted.len());
        Ok(PotatoArray::from(inserted))
    }

    // ========== FIND ==========

    /// First match after the pre-stage, or `None`.
    pub fn find_one(&self, test: impl Into<Test>, options: &FindOptions) -> Result<Option<Potato>> {
        let query = Query::compile(&test.into(), "findOne()")?;
        let potatoes = apply_pre_stage(self.store.read()?, options)?;

        let found = match potatoes.into_iter().find(|p| query.matches(p)) {
            Some(potato) => potato,
            None => {
                log::debug!("farm '{}': findOne() matched nothing", self.name);
                return Ok(None);
            }
        };

        Ok(apply_post_stage(vec![found], options, false)?.pop())
    }

    /// All matches, in pre-staged order unless sorted.
    pub fn find_many(&self, test: impl Into<Test>, options: &FindOptions) -> Result<PotatoArray> {
        let query = Query::compile(&test.into(), "findMany()")?;
        let potatoes = apply_pre_stage(self.store.read()?, options)?;

        let matches: Vec<Potato> = potatoes.into_iter().filter(|p| query.matches(p)).collect();
        log::debug!("farm '{}': findMany() matched {}", self.name, matches.len());

        Ok(PotatoArray::from(apply_post_stage(matches, options, true)?))
    }

    // ========== UPDATE ==========

    /// Updates the first match; returns its post-update snapshot, or the
    /// pre-update one with `updated: false`.
    pub fn update_one(
        &self,
        test: impl Into<Test>,
        update: impl Into<Update>,
        options: &FindOptions,
    ) -> Result<Option<Potato>> {
        let snapshots = self.update_logic("updateOne()", test.into(), update.into(), options, true)?;
        Ok(snapshots.into_iter().next())
    }

    pub fn update_many(
        &self,
        test: impl Into<Test>,
        update: impl Into<Update>,
        options: &FindOptions,
    ) -> Result<PotatoArray> {
        let snapshots = self.update_logic("updateMany()", test.into(), update.into(), options, false)?;
        Ok(PotatoArray::from(snapshots))
    }

    fn update_logic(
        &self,
        caller: &str,
        test: Test,
        update: Update,
        options: &FindOptions,
        single: bool,
    ) -> Result<Vec<Potato>> {
        let query = Query::compile(&test, caller)?;
        let plan = UpdatePlan::compile(&update, caller)?;
        let returns_updated = options.returns_updated();

        let mut potatoes = self.store.read()?;
        let mut snapshots = Vec::new();

        for potato in potatoes.iter_mut() {
            if !query.matches(potato) {
                continue;
            }

            if !returns_updated {
                snapshots.push(potato.clone());
            }

            plan.apply(potato)?;
            if !plan.is_transform() {
                self.stamper.touch(potato);
            }

            if returns_updated {
                snapshots.push(potato.clone());
            }

            if single {
                break;
            }
        }

        log::debug!("farm '{}': {} updated {}", self.name, caller, snapshots.len());
        if snapshots.is_empty() {
            return Ok(snapshots);
        }

        self.store.write(&potatoes)?;
        apply_post_stage(snapshots, options, false)
    }

    // ========== DELETE ==========

    /// Removes the first match and returns it.
    pub fn delete_one(&self, test: impl Into<Test>, options: &FindOptions) -> Result<Option<Potato>> {
        let removed = self.delete_logic("deleteOne()", test.into(), options, true)?;
        Ok(removed.into_iter().next())
    }

    pub fn delete_many(&self, test: impl Into<Test>, options: &FindOptions) -> Result<PotatoArray> {
        let removed = self.delete_logic("deleteMany()", test.into(), options, false)?;
        Ok(PotatoArray::from(removed))
    }

    fn delete_logic(
        &self,
        caller: &str,
        test: Test,
        options: &FindOptions,
        single: bool,
    ) -> Result<Vec<Potato>> {
        let query = Query::compile(&test, caller)?;
        let potatoes = self.store.read()?;

        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(potatoes.len());

        for potato in potatoes {
            let can_remove = !single || removed.is_empty();
            if can_remove && query.matches(&potato) {
                removed.push(potato);
            } else {
                kept.push(potato);
            }
        }

        log::debug!("farm '{}': {} removed {}", self.name, caller, removed.len());
        if removed.is_empty() {
            return Ok(removed);
        }

        self.store.write(&kept)?;
        apply_post_stage(removed, options, false)
    }

    // ========== SAMPLE ==========

    /// One uniformly random potato, `None` for an empty farm.
    pub fn sample_one(&self) -> Result<Option<Potato>> {
        let potatoes = self.store.read()?;
        Ok(potatoes.choose(&mut thread_rng()).cloned())
    }

    /// `count` independent draws, with replacement.
    pub fn sample_many(&self, count: usize) -> Result<PotatoArray> {
        let potatoes = self.store.read()?;
        let mut rng = thread_rng();

        Ok((0..count)
            .filter_map(|_| potatoes.choose(&mut rng).cloned())
            .collect())
    }

    /// Up to `count` distinct potatoes, capped at the farm size.
    pub fn sample_many_unique(&self, count: usize) -> Result<PotatoArray> {
        let mut potatoes = self.store.read()?;
        potatoes.shuffle(&mut thread_rng());
        potatoes.truncate(count);

        Ok(PotatoArray::from(potatoes))
    }
}

impl PartialEq for Farm {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.store == other.store
    }
}

/// `<dir>/<name>.json`
pub fn farm_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}
