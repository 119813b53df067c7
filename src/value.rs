use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Serialize, Serializer};
use serde_json::Number;
use std::fmt;

/// The key under which a reference is stored.
pub const REF_KEY: &str = "$ref";

pub type Mapping = IndexMap<String, Value>;

/// A JSON/YAML document tree.
///
/// Mappings keep insertion order, so a document loaded and dumped again
/// keeps its key order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    #[must_use]
    pub fn mapping() -> Self {
        Value::Mapping(Mapping::new())
    }

    /// Builds `{"$ref": reference}`.
    #[must_use]
    pub fn reference(reference: impl Into<String>) -> Self {
        let mut map = Mapping::new();
        map.insert(REF_KEY.to_string(), Value::String(reference.into()));
        Value::Mapping(map)
    }

    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// The `$ref` string of this node, if it is a mapping carrying one.
    #[must_use]
    pub fn ref_str(&self) -> Option<&str> {
        self.get(REF_KEY).and_then(Value::as_str)
    }

    /// True when the node is exactly `{"$ref": "..."}`.
    #[must_use]
    pub fn is_pure_ref(&self) -> bool {
        matches!(self, Value::Mapping(map) if map.len() == 1 && self.ref_str().is_some())
    }

    /// Loose structural scan: does a `$ref` occur anywhere below this node?
    #[must_use]
    pub fn contains_ref(&self) -> bool {
        match self {
            Value::Mapping(map) => {
                self.ref_str().is_some() || map.values().any(Value::contains_ref)
            }
            Value::Sequence(items) => items.iter().any(Value::contains_ref),
            _ => false,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }
}

/// Visits every `$ref` node depth-first, handing out the decoded token path
/// (relative to `value`) and a mutable handle to the node.
///
/// The callback sees a node before its children; nested refs inside a `$ref`
/// node's siblings are visited as well.
pub fn walk_refs_mut<E>(
    value: &mut Value,
    path: &mut Vec<String>,
    f: &mut dyn FnMut(&[String], &mut Value) -> Result<(), E>,
) -> Result<(), E> {
    if value.ref_str().is_some() {
        f(path.as_slice(), value)?;
    }
    match value {
        Value::Mapping(map) => {
            for (key, child) in map.iter_mut() {
                if key == REF_KEY || !child.contains_ref() {
                    continue;
                }
                path.push(key.clone());
                let result = walk_refs_mut(child, path, f);
                path.pop();
                result?;
            }
        }
        Value::Sequence(items) => {
            for (i, child) in items.iter_mut().enumerate() {
                if !child.contains_ref() {
                    continue;
                }
                path.push(i.to_string());
                let result = walk_refs_mut(child, path, f);
                path.pop();
                result?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Collects `(path, reference)` for every `$ref` below `value`.
#[must_use]
pub fn collect_refs(value: &Value) -> Vec<(Vec<String>, String)> {
    fn go(value: &Value, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, String)>) {
        if let Some(reference) = value.ref_str() {
            out.push((path.clone(), reference.to_string()));
        }
        match value {
            Value::Mapping(map) => {
                for (key, child) in map {
                    if key == REF_KEY {
                        continue;
                    }
                    path.push(key.clone());
                    go(child, path, out);
                    path.pop();
                }
            }
            Value::Sequence(items) => {
                for (i, child) in items.iter().enumerate() {
                    path.push(i.to_string());
                    go(child, path, out);
                    path.pop();
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    go(value, &mut Vec::new(), &mut out);
    out
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(items) => items.serialize(serializer),
            Value::Mapping(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON or YAML value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        // NaN and infinities have no JSON number form
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = Mapping::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(MappingKey(key)) = access.next_key()? {
            let value = access.next_value()?;
            map.insert(key, value);
        }
        Ok(Value::Mapping(map))
    }
}

/// Mapping key accepting any scalar; YAML allows `200:` or `true:` as keys.
struct MappingKey(String);

impl<'de> Deserialize<'de> for MappingKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = MappingKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a scalar mapping key")
            }

            fn visit_bool<E>(self, v: bool) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_string()))
            }

            fn visit_i64<E>(self, v: i64) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_string()))
            }

            fn visit_u64<E>(self, v: u64) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_string()))
            }

            fn visit_f64<E>(self, v: f64) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_string()))
            }

            fn visit_str<E>(self, v: &str) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_string()))
            }

            fn visit_string<E>(self, v: String) -> Result<MappingKey, E> {
                Ok(MappingKey(v))
            }

            fn visit_unit<E>(self) -> Result<MappingKey, E> {
                Ok(MappingKey("null".to_string()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Mapping(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => serde_json::Value::Number(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Mapping(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
