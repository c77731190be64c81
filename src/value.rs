//! # Dynamic Values
//!
//! Every expression, template, state entry and action parameter is a [`Value`].
//! The model mirrors a JSON document with one extra variant, [`Value::Undefined`],
//! which stands for "no such key" and is distinct from an explicit `null`.
//!
//! Containers are reference counted so that an immutable update can reuse every
//! untouched branch ([`Value::ptr_eq`] observes this).
//!
//! ## Coercion
//!
//! Operators never rely on Rust's own conversions. The helpers in this module
//! define the loose semantics used by the expression language:
//!
//! * [`Value::to_number`] - numeric conversion (`"" → 0`, `"x" → NaN`, `null → 0`)
//! * [`Value::to_bool`] - truthiness (`0`, `NaN`, `""`, `null`, undefined are falsy)
//! * [`Value::to_display_string`] - string conversion used by `+` and templates
//! * [`Value::loose_equals`] - coercing equality used by `==` / `!=`
//! * [`Value::compare`] - relational comparison used by `<`, `>`, `<=`, `>=`

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type Record = BTreeMap<String, Value>;

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Arc<Vec<Value>>),
    Object(Arc<Record>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    pub fn object(record: Record) -> Self {
        Value::Object(Arc::new(record))
    }

    pub fn empty_object() -> Self {
        Value::object(Record::new())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `null` or undefined.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<Vec<Value>>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Record>> {
        match self {
            Value::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Field lookup on a record. Anything else yields undefined.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(record) => record.get(key).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Reference identity for containers, value identity for scalars.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "record",
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => !(*n == 0.0 || n.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) => parse_numeric_string(s),
            Value::Array(_) | Value::Object(_) => {
                parse_numeric_string(&self.to_display_string())
            }
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => self.to_json_string(),
        }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::Value::from(self).to_string()
    }

    /// Containers collapse to their string form, scalars are kept.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) => Value::String(self.to_display_string()),
            other => other.clone(),
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => false,
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (Value::Number(a), Value::String(_)) => *a == other.to_number(),
            (Value::String(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Array(_) | Value::Object(_), _) => self.to_primitive().loose_equals(other),
            (_, Value::Array(_) | Value::Object(_)) => self.loose_equals(&other.to_primitive()),
            _ => false,
        }
    }

    /// Relational ordering. `None` when the comparison is undefined (NaN involved).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self.to_primitive(), other.to_primitive()) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
            (a, b) => a.to_number().partial_cmp(&b.to_number()),
        }
    }

    /// Length of an array or string, in elements/characters.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(items.len()),
            Value::String(s) => Some(s.chars().count()),
            _ => None,
        }
    }
}

fn parse_numeric_string(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf"/"nan" spellings that must stay NaN here.
        t if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        t => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Formats a number the way a dynamic host prints it: no trailing `.0`,
/// exponent form below `1e-6` and from `1e21` on.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let exponential = format!("{:e}", n);
        match exponential.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => exponential,
        }
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
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
        Value::array(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::object(record)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(record) => serde_json::Value::Object(
                record
                    .iter()
                    .map(|(key, value)| (key.clone(), serde_json::Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        serde_json::Value::from(&value)
    }
}

// Integral floats become JSON integers so that typed fields (indices, counts)
// deserialize from them.
fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_json::Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.to_bool());
        assert!(!Value::Null.to_bool());
        assert!(!Value::from(0.0).to_bool());
        assert!(!Value::from(f64::NAN).to_bool());
        assert!(!Value::from("").to_bool());
        assert!(Value::from("0").to_bool());
        assert!(Value::array(vec![]).to_bool());
        assert!(Value::empty_object().to_bool());
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::Null.to_number(), 0.0);
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert_eq!(Value::from(true).to_number(), 1.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert!(Value::from("inf").to_number().is_nan());
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::array(vec![Value::from(7.0)]).to_number(), 7.0);
    }

    #[test]
    fn test_display_string() {
        assert_eq!(Value::from(5.0).to_display_string(), "5");
        assert_eq!(Value::from(0.5).to_display_string(), "0.5");
        assert_eq!(Value::from(-0.0).to_display_string(), "0");
        assert_eq!(Value::from(f64::INFINITY).to_display_string(), "Infinity");
        assert_eq!(Value::from(1e21).to_display_string(), "1e+21");
        assert_eq!(Value::from(-2.5e30).to_display_string(), "-2.5e+30");
        assert_eq!(Value::from(1e-7).to_display_string(), "1e-7");
        assert_eq!(Value::from(0.000001).to_display_string(), "0.000001");
        assert_eq!(
            Value::from(123456789012345680000.0).to_display_string(),
            "123456789012345680000"
        );
        assert_eq!(
            Value::array(vec![Value::from(1.0), Value::Null, Value::from("a")])
                .to_display_string(),
            "1,,a"
        );
        assert_eq!(
            Value::from(json!({"a": 1})).to_display_string(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn test_loose_equals() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::from(0.0)));
        assert!(Value::from(1.0).loose_equals(&Value::from("1")));
        assert!(Value::from(true).loose_equals(&Value::from(1.0)));
        assert!(Value::from("1").loose_equals(&Value::from(true)));
        assert!(!Value::from(f64::NAN).loose_equals(&Value::from(f64::NAN)));
        assert!(Value::array(vec![Value::from(1.0)]).loose_equals(&Value::from("1")));

        let shared = Value::array(vec![]);
        assert!(shared.loose_equals(&shared.clone()));
        assert!(!Value::array(vec![]).loose_equals(&Value::array(vec![])));
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            Value::from("apple").compare(&Value::from("banana")),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::from("10").compare(&Value::from(9.0)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::from("x").compare(&Value::from(1.0)), None);
    }

    #[test]
    fn test_json_round_trip_keeps_integers() {
        let value = Value::from(json!({"index": 2, "ratio": 0.5}));
        let json = serde_json::Value::from(&value);
        assert_eq!(json, json!({"index": 2, "ratio": 0.5}));
    }

    proptest! {
        #[test]
        fn prop_number_strings_coerce_back(n in -1.0e12f64..1.0e12f64) {
            let s = Value::from(n).to_display_string();
            prop_assert_eq!(Value::from(s).to_number(), n);
        }

        #[test]
        fn prop_loose_equals_is_symmetric(a in -5i64..5, s in "[0-9]{0,2}") {
            let left = Value::from(a);
            let right = Value::from(s);
            prop_assert_eq!(left.loose_equals(&right), right.loose_equals(&left));
        }
    }
}
