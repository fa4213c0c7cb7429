// src/potato_array.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

use crate::document::Potato;
use crate::error::Result;
use crate::find_options::{apply_sort, Sort};

/// Ordered result sequence returned by the "many" operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PotatoArray {
    potatoes: Vec<Potato>,
}

impl PotatoArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-sorts by a field descriptor or a comparator.
    pub fn sort(&mut self, sort: &Sort) -> &mut Self {
        apply_sort(&mut self.potatoes, sort);
        self
    }

    /// Re-sorts by a `{"field": 1 | -1}` descriptor.
    pub fn sort_json(&mut self, descriptor: &Value) -> Result<&mut Self> {
        let sort = Sort::from_json(descriptor)?;
        Ok(self.sort(&sort))
    }

    pub fn sort_by<F>(&mut self, compare: F) -> &mut Self
    where
        F: FnMut(&Potato, &Potato) -> Ordering,
    {
        self.potatoes.sort_by(compare);
        self
    }

    pub fn into_vec(self) -> Vec<Potato> {
        self.potatoes
    }

    pub fn into_value(self) -> Value {
        Value::Array(self.potatoes.into_iter().map(Potato::into_value).collect())
    }
}

impl Deref for PotatoArray {
    type Target = [Potato];

    fn deref(&self) -> &Self::Target {
        &self.potatoes
    }
}

impl DerefMut for PotatoArray {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.potatoes
    }
}

impl From<Vec<Potato>> for PotatoArray {
    fn from(potatoes: Vec<Potato>) -> Self {
        PotatoArray { potatoes }
    }
}

impl FromIterator<Potato> for PotatoArray {
    fn from_iter<I: IntoIterator<Item = Potato>>(iter: I) -> Self {
        PotatoArray {
            potatoes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PotatoArray {
    type Item = Potato;
    type IntoIter = std::vec::IntoIter<Potato>;

    fn into_iter(self) -> Self::IntoIter {
        self.potatoes.into_iter()
    }
}

impl<'a> IntoIterator for &'a PotatoArray {
    type Item = &'a Potato;
    type IntoIter = std::slice::Iter<'a, Potato>;

    fn into_iter(self) -> Self::IntoIter {
        self.potatoes.iter()
    }
}
