//! # Data Types
//!
//! The canonical `DataType` enum for export schemas. Each type knows two
//! widths: its storage width inside the engine and its width on the export
//! wire. The two differ for narrow integers, which widen to 8 bytes on
//! export so that downstream readers decode a single integer shape.
//!
//! ## Export Widths
//!
//! | Type | Storage | Wire |
//! |------|---------|------|
//! | int2 | 2 | 8 |
//! | int4 | 4 | 8 |
//! | int8 | 8 | 8 |
//! | float8 | 8 | 8 |
//! | timestamp | 8 | 8 |
//! | text | variable | 4-byte length + bytes |
//! | blob | variable | 4-byte length + bytes |

use crate::config::EXPORT_INT_WIDTH;

/// Data type discriminant for exportable columns.
///
/// Uses `#[repr(u8)]` for a single-byte discriminant; discriminants are
/// grouped with fixed-width types below 20 and variable-width types above.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int2 = 1,
    Int4 = 2,
    Int8 = 3,
    Float8 = 5,
    Timestamp = 8,

    Text = 20,
    Blob = 21,
}

impl DataType {
    /// Wire width of this type in an exported row, or `None` for
    /// variable-width types.
    pub fn export_width(&self) -> Option<usize> {
        match self {
            DataType::Int2 | DataType::Int4 | DataType::Int8 => Some(EXPORT_INT_WIDTH),
            DataType::Float8 => Some(8),
            DataType::Timestamp => Some(8),
            DataType::Text | DataType::Blob => None,
        }
    }

    /// Returns true for types whose wire form carries a length prefix.
    pub fn is_variable(&self) -> bool {
        self.export_width().is_none()
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int2 => "int2",
            DataType::Int4 => "int4",
            DataType::Int8 => "int8",
            DataType::Float8 => "float8",
            DataType::Timestamp => "timestamp",
            DataType::Text => "text",
            DataType::Blob => "blob",
        }
    }
}
