//! Change sets: the loosely-typed mutation payload of an audit entry.
//!
//! A [`ChangeSet`] maps field names to [`ChangeValue`]s, which may themselves
//! be nested mappings (an owner sub-record, for example). Key order carries no
//! meaning; both types keep keys sorted so iteration order is already
//! canonical.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;

/// A single value inside a change set.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeValue {
    Null,
    Bool(bool),
    Integer(i64),
    /// Must be finite to be hashed.
    Float(f64),
    Text(String),
    List(Vec<ChangeValue>),
    Map(BTreeMap<String, ChangeValue>),
}

impl ChangeValue {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeValue::Null => "null",
            ChangeValue::Bool(_) => "bool",
            ChangeValue::Integer(_) => "integer",
            ChangeValue::Float(_) => "float",
            ChangeValue::Text(_) => "text",
            ChangeValue::List(_) => "list",
            ChangeValue::Map(_) => "map",
        }
    }

    /// Borrow as a string, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ChangeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a nested mapping, if this is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, ChangeValue>> {
        match self {
            ChangeValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Convert from a `serde_json::Value`.
    ///
    /// `path` is the dotted location used in error messages.
    pub fn from_json(value: serde_json::Value, path: &str) -> Result<Self, CoreError> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => ChangeValue::Null,
            Value::Bool(b) => ChangeValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ChangeValue::Integer(i)
                } else if n.is_u64() {
                    return Err(CoreError::IntegerOutOfRange { path: path.to_string() });
                } else {
                    match n.as_f64() {
                        Some(f) if f.is_finite() => ChangeValue::Float(f),
                        _ => return Err(CoreError::NonFiniteFloat { path: path.to_string() }),
                    }
                }
            }
            Value::String(s) => ChangeValue::Text(s),
            Value::Array(items) => ChangeValue::List(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| ChangeValue::from_json(v, &format!("{path}[{i}]")))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(obj) => ChangeValue::Map(
                obj.into_iter()
                    .map(|(k, v)| {
                        let child = format!("{path}.{k}");
                        ChangeValue::from_json(v, &child).map(|v| (k, v))
                    })
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl From<bool> for ChangeValue {
    fn from(b: bool) -> Self {
        ChangeValue::Bool(b)
    }
}

impl From<i64> for ChangeValue {
    fn from(i: i64) -> Self {
        ChangeValue::Integer(i)
    }
}

impl From<i32> for ChangeValue {
    fn from(i: i32) -> Self {
        ChangeValue::Integer(i.into())
    }
}

impl From<u32> for ChangeValue {
    fn from(i: u32) -> Self {
        ChangeValue::Integer(i.into())
    }
}

impl From<f64> for ChangeValue {
    fn from(f: f64) -> Self {
        ChangeValue::Float(f)
    }
}

impl From<&str> for ChangeValue {
    fn from(s: &str) -> Self {
        ChangeValue::Text(s.to_string())
    }
}

impl From<String> for ChangeValue {
    fn from(s: String) -> Self {
        ChangeValue::Text(s)
    }
}

impl From<Vec<ChangeValue>> for ChangeValue {
    fn from(items: Vec<ChangeValue>) -> Self {
        ChangeValue::List(items)
    }
}

impl From<ChangeSet> for ChangeValue {
    fn from(set: ChangeSet) -> Self {
        ChangeValue::Map(set.0)
    }
}

impl<T: Into<ChangeValue>> From<Option<T>> for ChangeValue {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(ChangeValue::Null, Into::into)
    }
}

impl Serialize for ChangeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChangeValue::Null => serializer.serialize_unit(),
            ChangeValue::Bool(b) => serializer.serialize_bool(*b),
            ChangeValue::Integer(i) => serializer.serialize_i64(*i),
            ChangeValue::Float(f) => serializer.serialize_f64(*f),
            ChangeValue::Text(s) => serializer.serialize_str(s),
            ChangeValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ChangeValue::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ChangeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ChangeValueVisitor)
    }
}

struct ChangeValueVisitor;

impl<'de> Visitor<'de> for ChangeValueVisitor {
    type Value = ChangeValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-like change value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<ChangeValue, E> {
        Ok(ChangeValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<ChangeValue, E> {
        Ok(ChangeValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<ChangeValue, D::Error> {
        ChangeValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<ChangeValue, E> {
        Ok(ChangeValue::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> Result<ChangeValue, E> {
        Ok(ChangeValue::Integer(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<ChangeValue, E> {
        i64::try_from(u)
            .map(ChangeValue::Integer)
            .map_err(|_| E::custom(format!("integer {u} is outside the signed 64-bit range")))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<ChangeValue, E> {
        if f.is_finite() {
            Ok(ChangeValue::Float(f))
        } else {
            Err(E::custom("non-finite float"))
        }
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<ChangeValue, E> {
        Ok(ChangeValue::Text(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<ChangeValue, E> {
        Ok(ChangeValue::Text(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ChangeValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(ChangeValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ChangeValue, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((k, v)) = access.next_entry::<String, ChangeValue>()? {
            map.insert(k, v);
        }
        Ok(ChangeValue::Map(map))
    }
}

/// The mutation payload of one audit entry: field name to new value.
///
/// This is a partial or full snapshot of the mutated record and, together with
/// the predecessor digest, the sole input to the entry hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, ChangeValue>);

impl ChangeSet {
    /// Create an empty change set.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ChangeValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ChangeValue>,
    ) -> Option<ChangeValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&ChangeValue> {
        self.0.get(key)
    }

    /// Mutable access to a field.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ChangeValue> {
        self.0.get_mut(key)
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) -> Option<ChangeValue> {
        self.0.remove(key)
    }

    /// Whether a field is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate fields in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ChangeValue)> {
        self.0.iter()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, ChangeValue> {
        &self.0
    }

    /// Build a change set from any serializable value that encodes as a map.
    ///
    /// Fails for values that are not maps, maps with non-string keys and
    /// integers outside the `i64` range. `serde_json` turns non-finite floats
    /// into `null` during this conversion; insert `ChangeValue::Float`
    /// directly to have them rejected at hash time.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, CoreError> {
        let json = serde_json::to_value(value)?;
        Self::from_json(json)
    }

    /// Build a change set from a JSON value that must be an object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        match ChangeValue::from_json(value, "$")? {
            ChangeValue::Map(map) => Ok(Self(map)),
            other => Err(CoreError::NotAMapping(other.kind())),
        }
    }
}

impl From<BTreeMap<String, ChangeValue>> for ChangeSet {
    fn from(map: BTreeMap<String, ChangeValue>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<ChangeValue>> FromIterator<(K, V)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for ChangeSet {
    type Item = (String, ChangeValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ChangeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_and_lookup() {
        let set = ChangeSet::new()
            .with("location", "Austin, TX")
            .with("price", 450_000i64)
            .with("verified", true);

        assert_eq!(set.len(), 3);
        assert_eq!(set.get("location").and_then(ChangeValue::as_str), Some("Austin, TX"));
        assert_eq!(set.get("price"), Some(&ChangeValue::Integer(450_000)));
        assert!(set.get("missing").is_none());
    }

    #[test]
    fn test_from_json_nested() {
        let set = ChangeSet::from_json(json!({
            "owner": {"name": "Alice Smith", "email": "alice@example.com"},
            "tags": ["garden", 2, null],
        }))
        .unwrap();

        let owner = set.get("owner").and_then(ChangeValue::as_map).unwrap();
        assert_eq!(owner.get("name").and_then(ChangeValue::as_str), Some("Alice Smith"));
        assert_eq!(
            set.get("tags"),
            Some(&ChangeValue::List(vec![
                ChangeValue::Text("garden".into()),
                ChangeValue::Integer(2),
                ChangeValue::Null,
            ]))
        );
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = ChangeSet::from_json(json!(["a", "b"])).unwrap_err();
        assert!(matches!(err, CoreError::NotAMapping("list")));
    }

    #[test]
    fn test_from_json_rejects_huge_unsigned() {
        let err = ChangeSet::from_json(json!({ "n": u64::MAX })).unwrap_err();
        match err {
            CoreError::IntegerOutOfRange { path } => assert_eq!(path, "$.n"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_serializable_struct() {
        #[derive(Serialize)]
        struct Listing<'a> {
            location: &'a str,
            terms: &'a str,
        }

        let set = ChangeSet::from_serializable(&Listing {
            location: "San Francisco, CA",
            terms: "12-month lease",
        })
        .unwrap();
        assert_eq!(set.get("terms").and_then(ChangeValue::as_str), Some("12-month lease"));
    }

    #[test]
    fn test_from_serializable_rejects_non_string_keys() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], "x");
        assert!(ChangeSet::from_serializable(&map).is_err());
    }

    #[test]
    fn test_serde_roundtrip_through_json_text() {
        let text = r#"{"a":1,"b":{"c":[true,1.5,"x"]},"d":null}"#;
        let set: ChangeSet = serde_json::from_str(text).unwrap();
        assert_eq!(serde_json::to_string(&set).unwrap(), text);
    }

    #[test]
    fn test_option_conversion() {
        let set = ChangeSet::new()
            .with("verification", Some("pending"))
            .with("notes", None::<String>);
        assert_eq!(set.get("notes"), Some(&ChangeValue::Null));
        assert_eq!(set.get("verification").and_then(ChangeValue::as_str), Some("pending"));
    }
}
