use std::any::Any;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::value::Value;

/// Type-erased access to a single record member.
///
/// Implemented for every `Serialize + DeserializeOwned + Clone + Default +
/// PartialEq` type, so record fields need nothing beyond their usual derives.
/// The zero value of a member is its `Default`.
pub trait FieldValue: Any {
    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str;

    /// Copies `other` into `self` when both have the same concrete type.
    /// Returns `false` and leaves `self` untouched otherwise.
    fn assign_from(&mut self, other: &dyn FieldValue) -> bool;

    fn encode(&self) -> Result<Value, serde_json::Error>;

    /// Replaces `self` with `value` decoded into the member type.
    /// On failure `self` is unchanged.
    fn decode(&mut self, value: Value) -> Result<(), serde_json::Error>;

    fn decode_json(&mut self, raw: &[u8]) -> Result<(), serde_json::Error>;

    fn reset(&mut self);

    fn is_zero(&self) -> bool;
}

impl<T> FieldValue for T
where
    T: Serialize + DeserializeOwned + Clone + Default + PartialEq + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn assign_from(&mut self, other: &dyn FieldValue) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(value) => {
                self.clone_from(value);
                true
            }
            None => false,
        }
    }

    fn encode(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn decode(&mut self, value: Value) -> Result<(), serde_json::Error> {
        *self = serde_json::from_value(value)?;
        Ok(())
    }

    fn decode_json(&mut self, raw: &[u8]) -> Result<(), serde_json::Error> {
        *self = serde_json::from_slice(raw)?;
        Ok(())
    }

    fn reset(&mut self) {
        *self = T::default();
    }

    fn is_zero(&self) -> bool {
        *self == T::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assign_requires_same_type() {
        let mut target = String::from("old");
        assert!(target.assign_from(&String::from("new")));
        assert_eq!(target, "new");

        assert!(!target.assign_from(&42i32));
        assert_eq!(target, "new");
    }

    #[test]
    fn decode_failure_keeps_previous_value() {
        let mut age = 7i32;
        assert!(age.decode(json!("seven")).is_err());
        assert_eq!(age, 7);

        age.decode(json!(30)).unwrap();
        assert_eq!(age, 30);
    }

    #[test]
    fn widening_goes_through_value() {
        let mut wide = 0i64;
        let narrow = 200u8;
        wide.decode(narrow.encode().unwrap()).unwrap();
        assert_eq!(wide, 200);

        let mut float = 0.0f64;
        float.decode(json!(25)).unwrap();
        assert_eq!(float, 25.0);
    }

    #[test]
    fn decodes_raw_json() {
        let mut tags: Vec<String> = Vec::new();
        tags.decode_json(br#"["a","b"]"#).unwrap();
        assert_eq!(tags, ["a", "b"]);
        assert!(tags.decode_json(b"{").is_err());
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn zero_is_default() {
        assert!(0i32.is_zero());
        assert!(String::new().is_zero());
        assert!(Vec::<String>::new().is_zero());
        assert!(!Some(0u8).is_zero());

        let mut tags = vec![String::from("a")];
        tags.reset();
        assert!(tags.is_empty());
    }
}
