use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Any value a static [crate::Condition] can hold or a [crate::Predicate] can return.
///
/// Values are serialized as plain JSON, so static conditions can be carried in JSON documents.
/// Whether a value satisfies a condition is decided by [ConditionValue::is_met], which is
/// deliberately narrower than Rust's or JSON's notion of truth.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ConditionValue>),
    Object(HashMap<String, ConditionValue>),
    /// No value at all. A static null condition is dropped when a feature is built; a predicate
    /// returning null is unmet.
    Null,
}

impl ConditionValue {
    /// Returns whether this value satisfies a condition.
    ///
    /// `false` and [ConditionValue::Null] are the only unmet values. Zero, the empty string, and
    /// empty arrays or objects are all met.
    pub fn is_met(&self) -> bool {
        !matches!(self, ConditionValue::Bool(false) | ConditionValue::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConditionValue::Null)
    }
}

impl From<bool> for ConditionValue {
    fn from(b: bool) -> Self {
        ConditionValue::Bool(b)
    }
}

impl From<i32> for ConditionValue {
    fn from(i: i32) -> Self {
        ConditionValue::Number(i.into())
    }
}

impl From<i64> for ConditionValue {
    fn from(i: i64) -> Self {
        ConditionValue::Number(i as f64)
    }
}

impl From<f64> for ConditionValue {
    fn from(f: f64) -> Self {
        ConditionValue::Number(f)
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        ConditionValue::String(s.to_owned())
    }
}

impl From<String> for ConditionValue {
    fn from(s: String) -> Self {
        ConditionValue::String(s)
    }
}

/// `None` becomes [ConditionValue::Null].
impl<T> From<Option<T>> for ConditionValue
where
    ConditionValue: From<T>,
{
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => v.into(),
            None => ConditionValue::Null,
        }
    }
}

impl<T> From<Vec<T>> for ConditionValue
where
    ConditionValue: From<T>,
{
    fn from(values: Vec<T>) -> Self {
        ConditionValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl From<&Value> for ConditionValue {
    fn from(json: &Value) -> Self {
        match json {
            Value::Null => ConditionValue::Null,
            Value::Bool(b) => ConditionValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(ConditionValue::Number).unwrap_or_else(|| {
                warn!("number {} does not fit in an f64, keeping it as a string", n);
                ConditionValue::String(n.to_string())
            }),
            Value::String(s) => ConditionValue::String(s.clone()),
            Value::Array(items) => ConditionValue::Array(items.iter().map(Into::into).collect()),
            Value::Object(fields) => ConditionValue::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.into()))
                    .collect(),
            ),
        }
    }
}
