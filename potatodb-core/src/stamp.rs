// src/stamp.rs
use chrono::Utc;
use serde_json::Value;

use crate::document::{Potato, PotatoId, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};

/// Attaches identity and timestamp fields, according to the farm's flags.
#[derive(Debug, Clone, Copy)]
pub struct Stamper {
    pub identification: bool,
    pub timestamps: bool,
}

impl Stamper {
    pub fn new(identification: bool, timestamps: bool) -> Self {
        Stamper {
            identification,
            timestamps,
        }
    }

    /// Insert-time stamping. A caller supplied `_id` is replaced.
    pub fn stamp(&self, potato: &mut Potato) {
        if self.identification {
            potato.insert(ID_FIELD.to_string(), PotatoId::generate().into());
        }

        if self.timestamps {
            let now = now_millis();
            potato.insert(CREATED_AT_FIELD.to_string(), Value::from(now));
            potato.insert(UPDATED_AT_FIELD.to_string(), Value::from(now));
        }
    }

    /// Refreshes `updatedAt` after a structural update.
    pub fn touch(&self, potato: &mut Potato) {
        if self.timestamps {
            potato.insert(UPDATED_AT_FIELD.to_string(), Value::from(now_millis()));
        }
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stamp_all_fields() {
        let mut potato = Potato::from_value(json!({"name": "Swordax"})).unwrap();
        let before = now_millis();

        Stamper::new(true, true).stamp(&mut potato);

        assert_eq!(potato.id().map(str::len), Some(32));
        let created = potato.get(CREATED_AT_FIELD).and_then(Value::as_i64).unwrap();
        let updated = potato.get(UPDATED_AT_FIELD).and_then(Value::as_i64).unwrap();
        assert!(created >= before);
        assert_eq!(created, updated);
    }

    #[test]
    fn test_stamp_respects_flags() {
        let mut potato = Potato::from_value(json!({"name": "plain"})).unwrap();

        Stamper::new(false, false).stamp(&mut potato);

        assert_eq!(potato, Potato::from_value(json!({"name": "plain"})).unwrap());
    }

    #[test]
    fn test_stamp_replaces_supplied_id() {
        let mut potato = Potato::from_value(json!({"_id": "mine"})).unwrap();

        Stamper::new(true, false).stamp(&mut potato);

        assert_ne!(potato.id(), Some("mine"));
    }

    #[test]
    fn test_touch_only_updated_at() {
        let mut potato = Potato::from_value(json!({"createdAt": 1, "updatedAt": 1})).unwrap();

        Stamper::new(true, true).touch(&mut potato);

        assert_eq!(potato.get(CREATED_AT_FIELD), Some(&json!(1)));
        assert!(potato.get(UPDATED_AT_FIELD).and_then(Value::as_i64).unwrap() > 1);
        assert!(potato.id().is_none());
    }
}
