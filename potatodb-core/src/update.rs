// src/update.rs
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;

use crate::document::{Potato, ID_FIELD};
use crate::error::{PotatoError, Result};
use crate::value::{js_string, strict_eq};

/// Mutates a potato in place; a returned potato replaces it entirely.
pub type Transform = Arc<dyn Fn(&mut Potato) -> Option<Potato> + Send + Sync>;

#[derive(Clone)]
pub enum Update {
    Transform(Transform),
    Spec(Value),
}

impl Update {
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&mut Potato) -> Option<Potato> + Send + Sync + 'static,
    {
        Update::Transform(Arc::new(f))
    }
}

impl From<Value> for Update {
    fn from(value: Value) -> Self {
        Update::Spec(value)
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Transform(_) => f.write_str("Update::Transform(..)"),
            Update::Spec(value) => f.debug_tuple("Update::Spec").field(value).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Inc,      // $inc
    Push,     // $push
    AddToSet, // $addToSet
    Pull,     // $pull
    Pop,      // $pop
    Concat,   // $concat
    Set,      // $set
    Unset,    // $unset
}

impl UpdateOperator {
    fn parse(op: &str) -> Result<Self> {
        match op {
            "$inc" => Ok(UpdateOperator::Inc),
            "$push" => Ok(UpdateOperator::Push),
            "$addToSet" => Ok(UpdateOperator::AddToSet),
            "$pull" => Ok(UpdateOperator::Pull),
            "$pop" => Ok(UpdateOperator::Pop),
            "$concat" => Ok(UpdateOperator::Concat),
            "$set" => Ok(UpdateOperator::Set),
            "$unset" => Ok(UpdateOperator::Unset),
            _ => Err(PotatoError::validation(format!(
                "Unsupported update operator: {}",
                op
            ))),
        }
    }

    fn name(self) -> &'static str {
        match self {
            UpdateOperator::Inc => "$inc",
            UpdateOperator::Push => "$push",
            UpdateOperator::AddToSet => "$addToSet",
            UpdateOperator::Pull => "$pull",
            UpdateOperator::Pop => "$pop",
            UpdateOperator::Concat => "$concat",
            UpdateOperator::Set => "$set",
            UpdateOperator::Unset => "$unset",
        }
    }
}

/// An update validated once per call and then applied to every match.
#[derive(Clone)]
pub enum UpdatePlan {
    Transform(Transform),
    Spec {
        operations: Vec<(UpdateOperator, Vec<(String, Value)>)>,
        assignments: Vec<(String, Value)>,
    },
}

impl UpdatePlan {
    pub fn compile(update: &Update, caller: &str) -> Result<Self> {
        let spec = match update {
            Update::Transform(transform) => return Ok(UpdatePlan::Transform(Arc::clone(transform))),
            Update::Spec(Value::Object(spec)) => spec,
            Update::Spec(_) => {
                return Err(PotatoError::validation(format!(
                    "{} expected an updates object or function as a second argument",
                    caller
                )))
            }
        };

        let mut operations = Vec::new();
        let mut assignments = Vec::new();

        for (key, value) in spec {
            if key.starts_with('$') {
                let operator = UpdateOperator::parse(key)?;
                let fields = value.as_object().ok_or_else(|| {
                    PotatoError::validation(format!("{} expects an object of fields", key))
                })?;

                let changes = fields
                    .iter()
                    .filter(|(field, _)| field.as_str() != ID_FIELD)
                    .map(|(field, change)| (field.clone(), change.clone()))
                    .collect();
                operations.push((operator, changes));
            } else if key != ID_FIELD {
                assignments.push((key.clone(), value.clone()));
            }
        }

        Ok(UpdatePlan::Spec {
            operations,
            assignments,
        })
    }

    pub fn is_transform(&self) -> bool {
        matches!(self, UpdatePlan::Transform(_))
    }

    pub fn apply(&self, potato: &mut Potato) -> Result<()> {
        match self {
            UpdatePlan::Transform(transform) => {
                let original_id = potato.get(ID_FIELD).cloned();

                if let Some(replacement) = transform(potato) {
                    *potato = replacement;
                }

                if let Some(id) = original_id {
                    if potato.get(ID_FIELD) != Some(&id) {
                        potato.insert(ID_FIELD.to_string(), id);
                    }
                }

                Ok(())
            }
            UpdatePlan::Spec {
                operations,
                assignments,
            } => {
                for (operator, changes) in operations {
                    for (field, change) in changes {
                        let target = potato.get_path(field).cloned();

                        match apply_operator(*operator, field, target, change)? {
                            Some(result) => potato.set_path(field, result),
                            None => {
                                potato.remove_path(field);
                            }
                        }
                    }
                }

                for (field, value) in assignments {
                    potato.set_path(field, value.clone());
                }

                Ok(())
            }
        }
    }
}

/// Computes the new value of one field. `None` means the field ends up absent.
fn apply_operator(
    operator: UpdateOperator,
    field: &str,
    target: Option<Value>,
    change: &Value,
) -> Result<Option<Value>> {
    let mismatch = |target: &Value| {
        PotatoError::validation(format!(
            "cannot apply {} to field '{}' holding {}",
            operator.name(),
            field,
            target
        ))
    };

    match operator {
        UpdateOperator::Inc => {
            let step = match change {
                Value::Number(n) => n,
                _ => return Err(PotatoError::validation(format!("$inc on '{}' requires a number", field))),
            };
            let current = match &target {
                None => Number::from(0),
                Some(Value::Number(n)) => n.clone(),
                Some(other) => return Err(mismatch(other)),
            };

            // Try int first to preserve integer types
            if let (Some(a), Some(b)) = (current.as_i64(), step.as_i64()) {
                if let Some(sum) = a.checked_add(b) {
                    return Ok(Some(Value::from(sum)));
                }
            }
            let sum = current.as_f64().unwrap_or(0.0) + step.as_f64().unwrap_or(0.0);
            Ok(Some(Number::from_f64(sum).map_or(Value::Null, Value::Number)))
        }

        UpdateOperator::Push => match target {
            None => Ok(Some(Value::Array(vec![change.clone()]))),
            Some(Value::Array(mut items)) => {
                items.push(change.clone());
                Ok(Some(Value::Array(items)))
            }
            Some(other) => Err(mismatch(&other)),
        },

        UpdateOperator::AddToSet => {
            let items = match target {
                None => Vec::new(),
                Some(Value::Array(items)) => items,
                Some(other) => return Err(mismatch(&other)),
            };

            let mut unique: Vec<Value> = Vec::with_capacity(items.len() + 1);
            for item in items.into_iter().chain(std::iter::once(change.clone())) {
                if !unique.iter().any(|kept| strict_eq(kept, &item)) {
                    unique.push(item);
                }
            }
            Ok(Some(Value::Array(unique)))
        }

        UpdateOperator::Pull => match target {
            None => Ok(None),
            Some(Value::Array(mut items)) => {
                items.retain(|item| !strict_eq(item, change));
                Ok(Some(Value::Array(items)))
            }
            Some(other) => Err(mismatch(&other)),
        },

        UpdateOperator::Pop => {
            let from_end = match change.as_f64() {
                Some(d) if d == 1.0 => true,
                Some(d) if d == -1.0 => false,
                _ => {
                    return Err(PotatoError::validation(format!(
                        "$pop on '{}' expects 1 or -1",
                        field
                    )))
                }
            };

            match target {
                None => Ok(None),
                Some(Value::Array(mut items)) => {
                    if from_end {
                        items.pop();
                    } else if !items.is_empty() {
                        items.remove(0);
                    }
                    Ok(Some(Value::Array(items)))
                }
                Some(other) => Err(mismatch(&other)),
            }
        }

        UpdateOperator::Concat => match (target, change) {
            (None, change) => Ok(Some(change.clone())),
            (Some(Value::Array(mut items)), Value::Array(more)) => {
                items.extend(more.iter().cloned());
                Ok(Some(Value::Array(items)))
            }
            (Some(Value::Array(mut items)), single) => {
                items.push(single.clone());
                Ok(Some(Value::Array(items)))
            }
            (Some(Value::String(mut text)), other) => {
                text.push_str(&js_string(Some(other)));
                Ok(Some(Value::String(text)))
            }
            (Some(other), _) => Err(mismatch(&other)),
        },

        UpdateOperator::Set => Ok(Some(change.clone())),

        UpdateOperator::Unset => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Potato {
        Potato::from_value(value).unwrap()
    }

    fn apply(potato: &mut Potato, update: Value) -> Result<()> {
        UpdatePlan::compile(&Update::from(update), "updateOne()")?.apply(potato)
    }

    #[test]
    fn test_inc_preserves_integers() {
        let mut potato = doc(json!({"count": 1, "score": 1.5}));

        apply(&mut potato, json!({"$inc": {"count": 2, "score": 1, "fresh": 5}})).unwrap();

        assert_eq!(potato.get("count"), Some(&json!(3)));
        assert!(potato.get("count").unwrap().is_i64());
        assert_eq!(potato.get("score"), Some(&json!(2.5)));
        assert_eq!(potato.get("fresh"), Some(&json!(5)));
    }

    #[test]
    fn test_inc_rejects_strings() {
        let mut potato = doc(json!({"count": "one"}));
        let err = apply(&mut potato, json!({"$inc": {"count": 1}})).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_push_and_add_to_set() {
        let mut potato = doc(json!({"tags": ["a", "b", "a"]}));

        apply(&mut potato, json!({"$push": {"tags": "c"}})).unwrap();
        assert_eq!(potato.get("tags"), Some(&json!(["a", "b", "a", "c"])));

        apply(&mut potato, json!({"$addToSet": {"tags": "b"}})).unwrap();
        assert_eq!(potato.get("tags"), Some(&json!(["a", "b", "c"])));

        apply(&mut potato, json!({"$addToSet": {"tags": "d"}})).unwrap();
        assert_eq!(potato.get("tags"), Some(&json!(["a", "b", "c", "d"])));
    }

    #[test]
    fn test_push_creates_missing_array() {
        let mut potato = doc(json!({}));
        apply(&mut potato, json!({"$push": {"log.entries": 1}})).unwrap();
        assert_eq!(potato.get_path("log.entries"), Some(&json!([1])));
    }

    #[test]
    fn test_pull_removes_every_occurrence() {
        let mut potato = doc(json!({"nums": [1, 2, 1, 3, 1]}));
        apply(&mut potato, json!({"$pull": {"nums": 1}})).unwrap();
        assert_eq!(potato.get("nums"), Some(&json!([2, 3])));
    }

    #[test]
    fn test_pop_both_ends() {
        let mut potato = doc(json!({"queue": [1, 2, 3, 4]}));

        apply(&mut potato, json!({"$pop": {"queue": 1}})).unwrap();
        assert_eq!(potato.get("queue"), Some(&json!([1, 2, 3])));

        apply(&mut potato, json!({"$pop": {"queue": -1}})).unwrap();
        assert_eq!(potato.get("queue"), Some(&json!([2, 3])));

        assert!(apply(&mut potato, json!({"$pop": {"queue": 2}})).is_err());
    }

    #[test]
    fn test_concat_arrays_and_strings() {
        let mut potato = doc(json!({"list": [1], "name": "Sword"}));

        apply(&mut potato, json!({"$concat": {"list": [2, 3], "name": "ax"}})).unwrap();

        assert_eq!(potato.get("list"), Some(&json!([1, 2, 3])));
        assert_eq!(potato.get("name"), Some(&json!("Swordax")));
    }

    #[test]
    fn test_plain_and_nested_assignments() {
        let mut potato = doc(json!({"name": "Bob", "profile": {"age": 20}}));

        apply(&mut potato, json!({"name": "Robert", "profile.age": 21, "profile.city": "Fes"})).unwrap();

        assert_eq!(potato.get("name"), Some(&json!("Robert")));
        assert_eq!(potato.get("profile"), Some(&json!({"age": 21, "city": "Fes"})));
    }

    #[test]
    fn test_set_and_unset() {
        let mut potato = doc(json!({"a": 1, "b": 2}));

        apply(&mut potato, json!({"$set": {"c.d": 3}, "$unset": {"a": ""}})).unwrap();

        assert_eq!(potato.as_map().len(), 2);
        assert!(potato.get("a").is_none());
        assert_eq!(potato.get_path("c.d"), Some(&json!(3)));
    }

    #[test]
    fn test_id_is_never_written() {
        let mut potato = doc(json!({"_id": "original", "n": 1}));

        apply(&mut potato, json!({"_id": "forged", "$set": {"_id": "forged"}, "n": 2})).unwrap();

        assert_eq!(potato.id(), Some("original"));
        assert_eq!(potato.get("n"), Some(&json!(2)));
    }

    #[test]
    fn test_transform_mutates_and_keeps_id() {
        let update = Update::transform(|p| {
            p.insert("_id".into(), json!("forged"));
            p.insert("seen".into(), json!(true));
            None
        });
        let mut potato = doc(json!({"_id": "original"}));

        UpdatePlan::compile(&update, "updateMany()").unwrap().apply(&mut potato).unwrap();

        assert_eq!(potato.id(), Some("original"));
        assert_eq!(potato.get("seen"), Some(&json!(true)));
    }

    #[test]
    fn test_transform_replacement() {
        let update = Update::transform(|_| Some(Potato::from_value(json!({"fresh": 1})).unwrap()));
        let mut potato = doc(json!({"_id": "keep", "old": 1}));

        UpdatePlan::compile(&update, "updateOne()").unwrap().apply(&mut potato).unwrap();

        assert!(potato.get("old").is_none());
        assert_eq!(potato.get("fresh"), Some(&json!(1)));
        assert_eq!(potato.id(), Some("keep"));
    }

    #[test]
    fn test_compile_rejects_bad_updates() {
        assert!(UpdatePlan::compile(&Update::from(json!("nope")), "updateOne()").is_err());
        assert!(UpdatePlan::compile(&Update::from(json!({"$rename": {"a": "b"}})), "updateOne()").is_err());
        assert!(UpdatePlan::compile(&Update::from(json!({"$inc": 5})), "updateOne()").is_err());
    }
}
