use std::cmp;
use std::fmt::{self, Display};

use indexmap::IndexMap;

use crate::utils::{fmt_list, fmt_map, QuotedStr};

/// A dynamic, recursively defined value: the thing a path resolves into, a
/// condition evaluates over, and an action mutates.
///
/// Maps preserve insertion order (`IndexMap`), so round-tripping a file whose
/// front-matter a rule did not touch never reorders its keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Seq(items) => {
                write!(f, "[")?;
                fmt_list(f, items)?;
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                fmt_map(f, map.iter().map(|(k, v)| (QuotedStr(k), v)))?;
                write!(f, "}}")
            }
        }
    }
}

/// The six variants a `TypeCheck` condition or a template error message can
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    String,
    Number,
    Bool,
    Array,
    Object,
    Null,
}

impl Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::String => "string",
            TypeKind::Number => "number",
            TypeKind::Bool => "boolean",
            TypeKind::Array => "array",
            TypeKind::Object => "object",
            TypeKind::Null => "null",
        };
        write!(f, "{name}")
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Seq(_) => "array",
            Value::Map(_) => "object",
        }
    }

    /// Whether `self` matches the requested [`TypeKind`], per the condition
    /// evaluator's type-check truth table: `object` excludes arrays, `number`
    /// matches either `Int` or `Float`.
    pub fn is_kind(&self, kind: TypeKind) -> bool {
        match (kind, self) {
            (TypeKind::String, Value::String(_)) => true,
            (TypeKind::Number, Value::Int(_) | Value::Float(_)) => true,
            (TypeKind::Bool, Value::Bool(_)) => true,
            (TypeKind::Array, Value::Seq(_)) => true,
            (TypeKind::Object, Value::Map(_)) => true,
            (TypeKind::Null, Value::Null) => true,
            _ => false,
        }
    }

    /// Is this value "empty", per the empty-check truth table: an explicit
    /// `Null` is not empty (it is merely not a collection), but an empty
    /// sequence, string or map is.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Value::Seq(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The `length` pseudo-path: size of a sequence/map/string, `None`
    /// otherwise.
    pub fn length(&self) -> Option<i64> {
        match self {
            Value::Seq(items) => Some(items.len() as i64),
            Value::Map(map) => Some(map.len() as i64),
            Value::String(s) => Some(s.chars().count() as i64),
            _ => None,
        }
    }

    /// Numeric value as `f64`, for relational comparisons and arithmetic-free
    /// numeric equality.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Value-level equality. Numeric coercion happens only between `Int` and
    /// `Float` (never string<->number).
    pub fn value_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }

    /// Ordering used by SORT / SORT_BY: cross-type pairs compare by a fixed
    /// type-tag ordering `Null < Bool < Int|Float < String`; numbers
    /// cross-compare by value; everything else (Seq, Map) is considered
    /// incomparable and falls back to equal (stable sort keeps original
    /// relative order for such pairs).
    pub fn compare_for_sort(&self, other: &Value) -> cmp::Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) | Value::Float(_) => 2,
                Value::String(_) => 3,
                Value::Seq(_) => 4,
                Value::Map(_) => 4,
            }
        }

        match (self, other) {
            (Value::Null, Value::Null) => cmp::Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => {
                a.partial_cmp(b).unwrap_or(cmp::Ordering::Equal)
            }
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => self
                .as_f64()
                .unwrap()
                .partial_cmp(&other.as_f64().unwrap())
                .unwrap_or(cmp::Ordering::Equal),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_seq_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Seq(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_eq_coerces_int_and_float_only() {
        assert!(Value::Int(3).value_eq(&Value::Float(3.0)));
        assert!(!Value::Int(3).value_eq(&Value::String("3".into())));
    }

    #[test]
    fn empty_check_distinguishes_null_from_empty_collections() {
        assert!(!Value::Null.is_empty_value());
        assert!(Value::Seq(vec![]).is_empty_value());
        assert!(Value::String(String::new()).is_empty_value());
        assert!(!Value::Seq(vec![Value::Null]).is_empty_value());
    }

    #[test]
    fn sort_ordering_crosses_types_by_tag() {
        assert_eq!(
            Value::Null.compare_for_sort(&Value::Bool(true)),
            cmp::Ordering::Less
        );
        assert_eq!(
            Value::Int(1).compare_for_sort(&Value::Float(1.0)),
            cmp::Ordering::Equal
        );
    }
}
