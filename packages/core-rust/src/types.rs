use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A document's fields: string keys mapped to schema-less values.
///
/// Uses `BTreeMap` so encoded documents compare and print deterministically.
pub type FieldMap = BTreeMap<String, Value>;

/// Generic runtime value stored in a document field.
///
/// Mirrors the value types a hosted document database accepts. Integers and
/// floats are distinct variants; [`Value::as_f64`] promotes integers so that
/// aggregate fields written as `0` still read back as a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit IEEE 754 float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Point in time, milliseconds since the Unix epoch.
    Timestamp(i64),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Nested field map.
    Map(FieldMap),
}

impl Value {
    /// Returns the string payload, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    ///
    /// Floats are never narrowed to integers.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a float for `Float` and `Int` values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the millisecond payload, if this is a `Timestamp`.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Rank of the value's type in the cross-type sort order.
    ///
    /// Null < Bool < Number < Timestamp < String < Array < Map. Ints and
    /// floats share a rank so they compare numerically.
    fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Timestamp(_) => 3,
            Self::String(_) => 4,
            Self::Array(_) => 5,
            Self::Map(_) => 6,
        }
    }

    /// Total ordering used for query sorting.
    ///
    /// NaN sorts before every other number, matching how the hosted store
    /// orders it.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::Map(a), Self::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.total_cmp(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => compare_numbers(x, y),
                _ => Ordering::Equal,
            },
        }
    }

    /// Equality used by query filters: numbers compare by value across
    /// `Int`/`Float`, everything else structurally.
    #[must_use]
    pub fn query_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.total_cmp(other) == Ordering::Equal
            }
            _ => self == other,
        }
    }
}

fn compare_numbers(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_promotes_to_float_but_not_back() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(3.0).as_i64(), None);
    }

    #[test]
    fn cross_type_order_follows_type_rank() {
        let ordered = [
            Value::Null,
            Value::Bool(true),
            Value::Int(-5),
            Value::Timestamp(0),
            Value::String("a".into()),
            Value::Array(vec![]),
            Value::Map(FieldMap::new()),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].total_cmp(&pair[1]), Ordering::Less, "{pair:?}");
        }
    }

    #[test]
    fn ints_and_floats_compare_numerically() {
        assert_eq!(Value::Int(2).total_cmp(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Float(2.0).total_cmp(&Value::Int(2)), Ordering::Equal);
        assert!(Value::Int(2).query_eq(&Value::Float(2.0)));
        assert!(!Value::Int(2).query_eq(&Value::String("2".into())));
    }

    #[test]
    fn nan_sorts_first_among_numbers() {
        assert_eq!(
            Value::Float(f64::NAN).total_cmp(&Value::Int(i64::MIN)),
            Ordering::Less
        );
    }

    #[test]
    fn arrays_compare_element_wise_then_by_length() {
        let short = Value::Array(vec![Value::Int(1)]);
        let long = Value::Array(vec![Value::Int(1), Value::Int(0)]);
        let bigger = Value::Array(vec![Value::Int(2)]);
        assert_eq!(short.total_cmp(&long), Ordering::Less);
        assert_eq!(long.total_cmp(&bigger), Ordering::Less);
    }
}
