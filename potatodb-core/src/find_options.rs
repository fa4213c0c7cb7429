// potatodb-core/src/find_options.rs
// Result shaping: recent/skip before matching; limit, sort, select and
// populate after matching.

use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::document::{Potato, ID_FIELD};
use crate::error::{PotatoError, Result};
use crate::farm::Farm;
use crate::value::{is_truthy, sort_cmp};

pub type Comparator = Arc<dyn Fn(&Potato, &Potato) -> Ordering + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Clone)]
pub enum Sort {
    /// Single field, dotted paths allowed
    Field { path: String, order: SortOrder },
    Comparator(Comparator),
}

impl Sort {
    pub fn ascending(path: impl Into<String>) -> Self {
        Sort::Field {
            path: path.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(path: impl Into<String>) -> Self {
        Sort::Field {
            path: path.into(),
            order: SortOrder::Descending,
        }
    }

    pub fn comparator<F>(f: F) -> Self
    where
        F: Fn(&Potato, &Potato) -> Ordering + Send + Sync + 'static,
    {
        Sort::Comparator(Arc::new(f))
    }

    /// Parses a `{"field": 1 | -1}` descriptor.
    pub fn from_json(descriptor: &Value) -> Result<Self> {
        let map = descriptor
            .as_object()
            .ok_or_else(|| PotatoError::validation("sort() expected a sortBy object"))?;

        let (path, direction) = match map.iter().next() {
            Some(entry) if map.len() == 1 => entry,
            _ => return Err(PotatoError::validation("sort() expected a single sortBy property")),
        };
        let direction = direction.as_f64().ok_or_else(|| {
            PotatoError::validation("sort() expected a number value in the sortBy object")
        })?;

        Ok(if direction < 0.0 {
            Sort::descending(path.clone())
        } else {
            Sort::ascending(path.clone())
        })
    }
}

impl fmt::Debug for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Field { path, order } => f
                .debug_struct("Field")
                .field("path", path)
                .field("order", order)
                .finish(),
            Sort::Comparator(_) => f.write_str("Comparator(..)"),
        }
    }
}

/// Options for find/update/delete calls
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Raw potatoes to drop before matching. Negative values are rejected.
    pub skip: Option<i64>,

    /// Reverse the raw sequence before skipping and matching.
    pub recent: bool,

    /// Positive: first N results, negative: last |N|. Find calls only.
    pub limit: Option<i64>,

    pub sort: Option<Sort>,

    /// Projection object: field → 1 (include) / 0 (exclude) / nested object
    pub select: Option<Value>,

    /// field path → farm whose `_id` the field references
    pub populate: Vec<(String, Farm)>,

    /// Update calls: return post-update (default) or pre-update snapshots.
    pub updated: Option<bool>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_recent(mut self, recent: bool) -> Self {
        self.recent = recent;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_select(mut self, select: Value) -> Self {
        self.select = Some(select);
        self
    }

    pub fn with_populate(mut self, field: impl Into<String>, farm: &Farm) -> Self {
        self.populate.push((field.into(), farm.clone()));
        self
    }

    pub fn with_updated(mut self, updated: bool) -> Self {
        self.updated = Some(updated);
        self
    }

    pub fn returns_updated(&self) -> bool {
        self.updated.unwrap_or(true)
    }
}

/// Pre-stage on the raw, unfiltered sequence: reverse if `recent`, then drop
/// the first `skip` potatoes.
pub fn apply_pre_stage(mut potatoes: Vec<Potato>, options: &FindOptions) -> Result<Vec<Potato>> {
    let skip = match options.skip {
        Some(skip) if skip < 0 => {
            return Err(PotatoError::validation(format!(
                "skip expects a non-negative number, got {}",
                skip
            )))
        }
        Some(skip) => skip as usize,
        None => 0,
    };

    if options.recent {
        potatoes.reverse();
    }

    if skip >= potatoes.len() {
        return Ok(Vec::new());
    }
    potatoes.drain(..skip);

    Ok(potatoes)
}

/// Post-stage on matched potatoes: limit (find only), sort, select, populate.
pub fn apply_post_stage(
    mut potatoes: Vec<Potato>,
    options: &FindOptions,
    with_limit: bool,
) -> Result<Vec<Potato>> {
    if with_limit {
        if let Some(limit) = options.limit {
            potatoes = apply_limit(potatoes, limit);
        }
    }

    if let Some(ref sort) = options.sort {
        apply_sort(&mut potatoes, sort);
    }

    if let Some(ref select) = options.select {
        let selection = select
            .as_object()
            .ok_or_else(|| PotatoError::validation("select expects an object"))?;
        potatoes = potatoes
            .iter()
            .map(|potato| Potato::from(apply_projection(potato.as_map(), selection)))
            .collect();
    }

    if !options.populate.is_empty() {
        for potato in potatoes.iter_mut() {
            apply_populate(potato, &options.populate)?;
        }
    }

    Ok(potatoes)
}

/// Apply sort to potatoes
pub fn apply_sort(potatoes: &mut [Potato], sort: &Sort) {
    match sort {
        Sort::Field { path, order } => potatoes.sort_by(|a, b| {
            let cmp = sort_cmp(a.get_path(path), b.get_path(path));
            match order {
                SortOrder::Ascending => cmp,
                SortOrder::Descending => cmp.reverse(),
            }
        }),
        Sort::Comparator(comparator) => potatoes.sort_by(|a, b| comparator(a, b)),
    }
}

/// Positive keeps the first N, negative keeps the trailing |N|.
pub fn apply_limit(mut potatoes: Vec<Potato>, limit: i64) -> Vec<Potato> {
    let len = potatoes.len();
    let count = (limit.unsigned_abs() as usize).min(len);

    if limit >= 0 {
        potatoes.truncate(count);
        potatoes
    } else {
        potatoes.split_off(len - count)
    }
}

/// Replaces each referenced `_id` with the potato it points to, one lookup
/// per field per potato. Dangling references become `null`.
fn apply_populate(potato: &mut Potato, populate: &[(String, Farm)]) -> Result<()> {
    for (field, farm) in populate {
        let reference = match potato.get_path(field) {
            None | Some(Value::Null) => continue,
            Some(reference) => reference.clone(),
        };

        let found = farm.find_one(json!({ ID_FIELD: reference }), &FindOptions::default())?;
        if found.is_none() {
            log::warn!(
                "populate: no potato with _id {} in farm '{}'",
                reference,
                farm.name()
            );
        }

        potato.set_path(field, found.map_or(Value::Null, Potato::into_value));
    }

    Ok(())
}

/// Apply projection to a potato.
///
/// Any selection value of `0` switches to exclusion mode, where only the
/// `0`-marked keys are dropped. Otherwise only keys with a truthy selection
/// value are kept. Nested selection objects recurse into sub-documents.
pub fn apply_projection(potato: &Map<String, Value>, selection: &Map<String, Value>) -> Map<String, Value> {
    let exclusion = selection.values().any(is_zero);
    let mut result = Map::new();

    for (key, value) in potato {
        match selection.get(key) {
            Some(Value::Object(nested)) => {
                let projected = match value {
                    Value::Object(sub) => Value::Object(apply_projection(sub, nested)),
                    other => other.clone(),
                };
                result.insert(key.clone(), projected);
            }
            Some(marker) if exclusion => {
                if !is_zero(marker) {
                    result.insert(key.clone(), value.clone());
                }
            }
            None if exclusion => {
                result.insert(key.clone(), value.clone());
            }
            Some(marker) => {
                if is_truthy(marker) {
                    result.insert(key.clone(), value.clone());
                }
            }
            None => {}
        }
    }

    result
}

fn is_zero(value: &Value) -> bool {
    value.as_f64() == Some(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Potato> {
        values.into_iter().map(|v| Potato::from_value(v).unwrap()).collect()
    }

    fn field(potatoes: &[Potato], name: &str) -> Vec<Value> {
        potatoes.iter().map(|p| p.get(name).cloned().unwrap_or(Value::Null)).collect()
    }

    fn numbered(count: i64) -> Vec<Potato> {
        docs((1..=count).map(|n| json!({"n": n})).collect())
    }

    #[test]
    fn test_projection_include_mode() {
        let doc = json!({"name": "Alice", "age": 30, "city": "NYC", "_id": "x"});
        let selection = json!({"name": 1, "age": true});

        let result = apply_projection(doc.as_object().unwrap(), selection.as_object().unwrap());

        assert_eq!(Value::Object(result), json!({"name": "Alice", "age": 30}));
    }

    #[test]
    fn test_projection_exclude_mode() {
        let doc = json!({"name": "Alice", "age": 30, "city": "NYC"});
        let selection = json!({"city": 0});

        let result = apply_projection(doc.as_object().unwrap(), selection.as_object().unwrap());

        assert_eq!(Value::Object(result), json!({"name": "Alice", "age": 30}));
    }

    #[test]
    fn test_projection_nested() {
        let doc = json!({
            "title": "Post",
            "owner": {"username": "Swordax", "email": "s@x.io", "age": 25},
            "text": "long"
        });
        let selection = json!({"title": 1, "owner": {"username": 1}});

        let result = apply_projection(doc.as_object().unwrap(), selection.as_object().unwrap());

        assert_eq!(
            Value::Object(result),
            json!({"title": "Post", "owner": {"username": "Swordax"}})
        );
    }

    #[test]
    fn test_projection_falsy_marker_dropped() {
        let doc = json!({"a": 1, "b": 2});
        let selection = json!({"a": 1, "b": false});

        let result = apply_projection(doc.as_object().unwrap(), selection.as_object().unwrap());

        assert_eq!(Value::Object(result), json!({"a": 1}));
    }

    #[test]
    fn test_pre_stage_recent_then_skip() {
        let options = FindOptions::new().with_recent(true).with_skip(1);

        let result = apply_pre_stage(numbered(4), &options).unwrap();

        assert_eq!(field(&result, "n"), vec![json!(3), json!(2), json!(1)]);
    }

    #[test]
    fn test_pre_stage_skip_beyond_length() {
        let result = apply_pre_stage(numbered(2), &FindOptions::new().with_skip(10)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_pre_stage_negative_skip() {
        let err = apply_pre_stage(numbered(2), &FindOptions::new().with_skip(-1)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_limit_positive_and_negative() {
        assert_eq!(field(&apply_limit(numbered(5), 2), "n"), vec![json!(1), json!(2)]);
        assert_eq!(field(&apply_limit(numbered(5), -2), "n"), vec![json!(4), json!(5)]);
        assert_eq!(apply_limit(numbered(5), 10).len(), 5);
        assert_eq!(apply_limit(numbered(5), -10).len(), 5);
        assert!(apply_limit(numbered(5), 0).is_empty());
    }

    #[test]
    fn test_sort_field_directions() {
        let mut potatoes = docs(vec![json!({"age": 30}), json!({"age": 25}), json!({"age": 35})]);

        apply_sort(&mut potatoes, &Sort::ascending("age"));
        assert_eq!(field(&potatoes, "age"), vec![json!(25), json!(30), json!(35)]);

        apply_sort(&mut potatoes, &Sort::descending("age"));
        assert_eq!(field(&potatoes, "age"), vec![json!(35), json!(30), json!(25)]);
    }

    #[test]
    fn test_sort_nested_path_and_comparator() {
        let mut potatoes = docs(vec![
            json!({"name": "b", "stats": {"score": 2}}),
            json!({"name": "a", "stats": {"score": 9}}),
            json!({"name": "c", "stats": {"score": 5}}),
        ]);

        apply_sort(&mut potatoes, &Sort::from_json(&json!({"stats.score": -1})).unwrap());
        assert_eq!(field(&potatoes, "name"), vec![json!("a"), json!("c"), json!("b")]);

        let by_name = Sort::comparator(|a, b| {
            a.get("name").and_then(Value::as_str).cmp(&b.get("name").and_then(Value::as_str))
        });
        apply_sort(&mut potatoes, &by_name);
        assert_eq!(field(&potatoes, "name"), vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_sort_from_json_validation() {
        assert!(Sort::from_json(&json!("age")).is_err());
        assert!(Sort::from_json(&json!({"a": 1, "b": 1})).is_err());
        assert!(Sort::from_json(&json!({"a": "up"})).is_err());
    }

    #[test]
    fn test_post_stage_limits_before_sorting() {
        let potatoes = docs(vec![json!({"n": 2}), json!({"n": 3}), json!({"n": 1})]);
        let options = FindOptions::new().with_sort(Sort::descending("n")).with_limit(2);

        let result = apply_post_stage(potatoes, &options, true).unwrap();

        assert_eq!(field(&result, "n"), vec![json!(3), json!(2)]);

        let potatoes = docs(vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
        let result = apply_post_stage(potatoes, &options, true).unwrap();

        assert_eq!(field(&result, "n"), vec![json!(2), json!(1)]);
    }

    #[test]
    fn test_post_stage_limit_only_for_find() {
        let options = FindOptions::new().with_limit(1);
        let result = apply_post_stage(numbered(3), &options, false).unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_updated_defaults_to_true() {
        assert!(FindOptions::new().returns_updated());
        assert!(!FindOptions::new().with_updated(false).returns_updated());
    }
}
