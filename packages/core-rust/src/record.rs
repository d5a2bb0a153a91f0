//! Typed records decoded from documents.

use crate::types::{FieldMap, Value};

/// A value type that can be written to and read back from a document.
///
/// Decoding is total-or-nothing: if any required field is absent or has the
/// wrong type, [`from_fields`](Self::from_fields) returns `None` and no
/// partially populated record is ever produced.
pub trait DocumentSerializable: Sized {
    /// Decodes a record from a document's fields.
    fn from_fields(fields: &FieldMap) -> Option<Self>;

    /// Encodes the record into the fields written to the store.
    fn to_fields(&self) -> FieldMap;
}

/// Typed field accessors used by `from_fields` implementations.
pub(crate) trait FieldAccess {
    fn string(&self, key: &str) -> Option<String>;
    fn int(&self, key: &str) -> Option<i64>;
    fn float(&self, key: &str) -> Option<f64>;
    fn timestamp(&self, key: &str) -> Option<i64>;
}

impl FieldAccess for FieldMap {
    fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    fn timestamp(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_timestamp)
    }
}
