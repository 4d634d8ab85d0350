//! Observed Values
//!
//! [`Value`] is the JSON-shaped tree a [`Model`](crate::Model) stores. It
//! differs from `serde_json::Value` in one respect: arrays are
//! [`ObservableArray`] handles. Cloning a `Value` shares its arrays, so an
//! array fetched with `Model::get` is the same instance the model holds and
//! in-place edits through it are seen by the model's observers.
//!
//! # Equality
//!
//! `PartialEq` is structural (deep) equality, the dirty check used throughout
//! the crate:
//!
//! - numbers compare numerically (`1 == 1.0`)
//! - arrays compare element-wise, regardless of instance
//! - objects compare as key/value sets, ignoring insertion order
//!
//! [`Value::deep_clone`] is the matching structural copy; it allocates fresh
//! array instances so the copy never aliases later in-place edits.

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Number;

use crate::error::{ObserveError, Result};
use crate::keypath;
use crate::observe::ObservableArray;

/// Ordered string-keyed map used for object values.
pub type Map = IndexMap<String, Value>;

/// A value stored in a model.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(ObservableArray),
    Object(Map),
}

impl Value {
    /// An empty object.
    pub fn object() -> Self {
        Value::Object(Map::new())
    }

    /// A new array instance holding `items`.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(ObservableArray::from_iter(items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ObservableArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Structural copy with fresh array instances.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Array(array) => {
                Value::Array(array.to_vec().iter().map(Value::deep_clone).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.deep_clone()))
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }

    /// Read the value at `path`. Missing segments yield `None`; numeric
    /// segments index into arrays.
    pub fn get_path(&self, path: &str) -> Result<Option<Value>> {
        let segments = keypath::segments(path)?;
        Ok(self.lookup(&segments))
    }

    /// Write `value` at `path`, creating intermediate objects as needed.
    ///
    /// Scalar intermediates are replaced by objects. Arrays cannot be written
    /// through; that case fails before anything is modified.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<()> {
        let segments = keypath::segments(path)?;
        self.assign(path, &segments, value)
    }

    pub(crate) fn lookup(&self, segments: &[&str]) -> Option<Value> {
        let Some((head, rest)) = segments.split_first() else {
            return Some(self.clone());
        };
        match self {
            Value::Object(map) => map.get(*head)?.lookup(rest),
            Value::Array(array) => {
                let index: usize = head.parse().ok()?;
                array.get(index)?.lookup(rest)
            }
            _ => None,
        }
    }

    pub(crate) fn assign(&mut self, path: &str, segments: &[&str], value: Value) -> Result<()> {
        self.check_assign(path, segments)?;
        self.assign_unchecked(segments, value);
        Ok(())
    }

    /// Fail if a write along `segments` would have to step into an array.
    pub(crate) fn check_assign(&self, path: &str, segments: &[&str]) -> Result<()> {
        if self.crosses_array(segments) {
            return Err(ObserveError::ArrayTraversal {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Whether writing along `segments` would have to step into an array.
    fn crosses_array(&self, segments: &[&str]) -> bool {
        let Some((head, rest)) = segments.split_first() else {
            return false;
        };
        match self {
            Value::Array(_) => true,
            Value::Object(map) => match map.get(*head) {
                Some(child) => child.crosses_array(rest),
                None => false,
            },
            _ => false,
        }
    }

    fn assign_unchecked(&mut self, segments: &[&str], value: Value) {
        let Some((head, rest)) = segments.split_first() else {
            *self = value;
            return;
        };
        if !self.is_object() {
            *self = Value::object();
        }
        if let Value::Object(map) = self {
            let child = map.entry(head.to_string()).or_insert(Value::Null);
            child.assign_unchecked(rest, value);
        }
    }

    /// Total order used by [`ObservableArray::sort`].
    ///
    /// Values of different kinds order as null < bool < number < string <
    /// array < object.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.to_vec(), b.to_vec());
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| x.total_cmp(y))
                    .find(|ord| ord.is_ne())
                    .unwrap_or_else(|| a.len().cmp(&b.len()))
            }
            (Value::Object(a), Value::Object(b)) => a
                .iter()
                .zip(b.iter())
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.total_cmp(vb)))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    /// Convert into a plain `serde_json::Value`, copying array contents.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(array) => {
                serde_json::Value::Array(array.to_vec().iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    a.as_f64() == b.as_f64()
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.content_eq(b),
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| b.get(key) == Some(value))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(Number::from(n))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ObservableArray::new(items))
    }
}

impl From<ObservableArray> for Value {
    fn from(array: ObservableArray) -> Self {
        Value::Array(array)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(array) => {
                let items = array.to_vec();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
