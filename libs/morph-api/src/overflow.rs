use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::{Map, Value};

/// Nullable JSON-encoded bag of fields that had no counterpart on the other
/// side of an adaptation.
///
/// Absent when it holds no bytes; empty bytes are also treated as absent.
/// Serializes as the embedded JSON document (or `null`), so a record carrying
/// an overflow slot round-trips through serde unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overflow(Option<Vec<u8>>);

impl Overflow {
    pub const fn none() -> Self {
        Self(None)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() { Self(None) } else { Self(Some(bytes)) }
    }

    /// Encodes `value`; JSON `null` gives an absent slot.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self(None));
        }
        Ok(Self(Some(serde_json::to_vec(value)?)))
    }

    pub fn from_map(map: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        Ok(Self(Some(serde_json::to_vec(map)?)))
    }

    pub fn is_absent(&self) -> bool {
        self.as_bytes().is_none()
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref().filter(|b| !b.is_empty())
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        self.0.filter(|b| !b.is_empty())
    }

    pub fn to_value(&self) -> Result<Option<Value>, serde_json::Error> {
        self.decode()
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.as_bytes().map(serde_json::from_slice).transpose()
    }
}

impl Serialize for Overflow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_bytes() {
            None => serializer.serialize_none(),
            Some(bytes) => {
                let value: Value = serde_json::from_slice(bytes).map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&value)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Overflow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(Self(None)),
            Some(value) => serde_json::to_vec(&value).map(|b| Self(Some(b))).map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_bytes_are_absent() {
        assert!(Overflow::none().is_absent());
        assert!(Overflow::from_bytes(Vec::new()).is_absent());
        assert!(Overflow::from_value(&Value::Null).unwrap().is_absent());
        assert!(!Overflow::from_bytes(b"{}".to_vec()).is_absent());
        assert_eq!(Overflow::from_bytes(b"{}".to_vec()).into_bytes(), Some(b"{}".to_vec()));
        assert_eq!(Overflow(Some(Vec::new())).into_bytes(), None);
    }

    #[test]
    fn decodes_stored_document() {
        let slot = Overflow::from_value(&json!({"email": "j@x.com"})).unwrap();
        assert_eq!(slot.to_value().unwrap(), Some(json!({"email": "j@x.com"})));
        assert_eq!(Overflow::none().to_value().unwrap(), None);
    }

    #[test]
    fn serializes_as_embedded_document() {
        let slot = Overflow::from_bytes(br#"{"a":1}"#.to_vec());
        assert_eq!(serde_json::to_value(&slot).unwrap(), json!({"a": 1}));
        assert_eq!(serde_json::to_value(Overflow::none()).unwrap(), Value::Null);

        let back: Overflow = serde_json::from_value(json!({"a": 1})).unwrap();
        assert_eq!(back.to_value().unwrap(), Some(json!({"a": 1})));
        let null: Overflow = serde_json::from_value(Value::Null).unwrap();
        assert!(null.is_absent());
    }

    #[test]
    fn malformed_bytes_fail_to_decode() {
        let slot = Overflow::from_bytes(b"{not json".to_vec());
        assert!(slot.to_value().is_err());
    }
}
