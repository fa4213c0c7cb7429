// src/document.rs
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::{Deref, DerefMut};

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

const ID_BYTES: usize = 16;

/// A schema-free record of a farm. Key order is the insertion order and is
/// kept through serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Potato(Map<String, Value>);

/// Opaque identity string: 16 random bytes from the OS CSPRNG, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PotatoId(String);

impl PotatoId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        PotatoId(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PotatoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<PotatoId> for Value {
    fn from(id: PotatoId) -> Self {
        Value::String(id.0)
    }
}

impl Potato {
    pub fn new() -> Self {
        Potato(Map::new())
    }

    /// Wraps a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Potato(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Reads a dotted path ("profile.address.city"). Only nested objects are
    /// traversed; array indexes are not path segments.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        get_path(&self.0, path)
    }

    /// Writes a dotted path, creating intermediate objects where missing.
    pub fn set_path(&mut self, path: &str, value: Value) {
        set_path(&mut self.0, path, value)
    }

    /// Removes a dotted path, keeping the order of the remaining keys.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        remove_path(&mut self.0, path)
    }
}

impl Deref for Potato {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Potato {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for Potato {
    fn from(map: Map<String, Value>) -> Self {
        Potato(map)
    }
}

impl From<Potato> for Value {
    fn from(potato: Potato) -> Self {
        potato.into_value()
    }
}

pub(crate) fn get_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = map.get(first)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

pub(crate) fn set_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));

            // Scalars standing in the way are replaced by an object
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }

            if let Value::Object(child_map) = child {
                set_path(child_map, rest, value);
            }
        }
    }
}

pub(crate) fn remove_path(map: &mut Map<String, Value>, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => {
            let removed = map.get(path).cloned();
            if removed.is_some() {
                map.retain(|key, _| key != path);
            }
            removed
        }
        Some((head, rest)) => match map.get_mut(head) {
            Some(Value::Object(child_map)) => remove_path(child_map, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn potato(value: Value) -> Potato {
        Potato::from_value(value).unwrap()
    }

    #[test]
    fn test_potato_id_format() {
        let id = PotatoId::generate();

        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_potato_id_unique() {
        let a = PotatoId::generate();
        let b = PotatoId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Potato::from_value(json!([1, 2])).is_none());
        assert!(Potato::from_value(json!("potato")).is_none());
        assert!(Potato::from_value(json!({})).is_some());
    }

    #[test]
    fn test_get_path_nested() {
        let doc = potato(json!({
            "name": "Alice",
            "profile": {"address": {"city": "Rabat"}},
            "tags": ["a", "b"]
        }));

        assert_eq!(doc.get_path("name"), Some(&json!("Alice")));
        assert_eq!(doc.get_path("profile.address.city"), Some(&json!("Rabat")));
        assert!(doc.get_path("profile.phone").is_none());
        assert!(doc.get_path("name.first").is_none());
        // arrays are not traversed
        assert!(doc.get_path("tags.0").is_none());
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut doc = potato(json!({"name": "Bob"}));

        doc.set_path("profile.address.city", json!("Casablanca"));

        assert_eq!(doc.get_path("profile.address.city"), Some(&json!("Casablanca")));
        assert_eq!(doc.get("name"), Some(&json!("Bob")));
    }

    #[test]
    fn test_set_path_replaces_scalar_intermediate() {
        let mut doc = potato(json!({"profile": 5}));

        doc.set_path("profile.age", json!(30));

        assert_eq!(doc.get("profile"), Some(&json!({"age": 30})));
    }

    #[test]
    fn test_remove_path_keeps_order() {
        let mut doc = potato(json!({"a": 1, "b": 2, "c": 3, "d": {"e": 4, "f": 5}}));

        assert_eq!(doc.remove_path("b"), Some(json!(2)));
        assert_eq!(doc.remove_path("d.e"), Some(json!(4)));
        assert_eq!(doc.remove_path("missing.path"), None);

        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, vec!["a", "c", "d"]);
        assert_eq!(doc.get("d"), Some(&json!({"f": 5})));
    }

    #[test]
    fn test_id_accessor() {
        let doc = potato(json!({"_id": "abc", "n": 1}));
        assert_eq!(doc.id(), Some("abc"));

        let anonymous = potato(json!({"n": 1}));
        assert_eq!(anonymous.id(), None);
    }

    #[test]
    fn test_serialization_preserves_key_order() {
        let doc = potato(json!({"zeta": 1, "alpha": 2, "mid": 3}));
        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text, r#"{"zeta":1,"alpha":2,"mid":3}"#);
    }
}
