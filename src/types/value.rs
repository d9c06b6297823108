//! # Runtime Value Representation
//!
//! `Value<'a>` is the runtime form of a column value as handed over by the
//! transaction executor. Text and blob payloads use `Cow` so callers can pass
//! borrowed slices straight out of tuple storage without copying; the
//! serializer only ever reads them.
//!
//! All integer storage widths share `Value::Int` because the export frame
//! widens every integer to 8 bytes anyway. Range checks against narrow
//! declared types are the executor's concern, not the export path's.

use std::borrow::Cow;

use super::DataType;

/// Runtime value for one exportable column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Int(i64),
    Float(f64),
    Timestamp(i64),
    Text(Cow<'a, str>),
    Blob(Cow<'a, [u8]>),
}

impl<'a> Value<'a> {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value can be serialized into a column of the
    /// given declared type. NULL is compatible with every type.
    pub fn matches_type(&self, data_type: DataType) -> bool {
        match self {
            Value::Null => true,
            Value::Int(_) => matches!(
                data_type,
                DataType::Int2 | DataType::Int4 | DataType::Int8
            ),
            Value::Float(_) => data_type == DataType::Float8,
            Value::Timestamp(_) => data_type == DataType::Timestamp,
            Value::Text(_) => data_type == DataType::Text,
            Value::Blob(_) => data_type == DataType::Blob,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Timestamp(_) => "timestamp",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    pub fn text(s: &'a str) -> Self {
        Value::Text(Cow::Borrowed(s))
    }

    pub fn blob(b: &'a [u8]) -> Self {
        Value::Blob(Cow::Borrowed(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_matches_every_type() {
        for dt in [
            DataType::Int2,
            DataType::Int8,
            DataType::Float8,
            DataType::Timestamp,
            DataType::Text,
            DataType::Blob,
        ] {
            assert!(Value::Null.matches_type(dt));
        }
    }

    #[test]
    fn int_matches_all_integer_widths() {
        assert!(Value::Int(1).matches_type(DataType::Int2));
        assert!(Value::Int(1).matches_type(DataType::Int4));
        assert!(Value::Int(1).matches_type(DataType::Int8));
        assert!(!Value::Int(1).matches_type(DataType::Text));
    }
}
