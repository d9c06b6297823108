//! # Export Schema
//!
//! `ExportSchema` describes the user columns of one export stream and
//! precomputes the frame layout the serializer needs per row: the null mask
//! width (which covers the metadata columns too) and the fixed portion of
//! the payload. Precomputing keeps the per-row size calculation to a walk
//! over variable-width values only.
//!
//! ## Frame Layout Inputs
//!
//! - `null_mask_len`: `ceil((metadata_cols + user_cols) / 8)` bytes
//! - `fixed_payload_len`: sum of export widths over fixed-width user columns
//! - `column_names`: cached owned list handed to the consumer on every push

use crate::config::{
    METADATA_BYTES, METADATA_COLUMN_COUNT, ROW_HEADER_SIZE, VAR_LENGTH_PREFIX_SIZE,
};
#[cfg(test)]
use crate::types::DataType;
use crate::types::{ColumnDef, Value};

/// Schema of the user columns carried by one export stream.
///
/// The metadata columns are implicit; they are fixed by the wire format and
/// identical for every stream.
#[derive(Debug, Clone)]
pub struct ExportSchema {
    columns: Vec<ColumnDef>,
    column_names: Vec<String>,
    null_mask_len: usize,
    fixed_payload_len: usize,
    has_variable: bool,
}

impl ExportSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        let column_names = columns.iter().map(|c| c.name().to_string()).collect();
        let null_mask_len = Self::null_mask_len_for(columns.len());
        let fixed_payload_len = columns
            .iter()
            .filter_map(|c| c.data_type().export_width())
            .sum();
        let has_variable = columns.iter().any(|c| c.data_type().is_variable());

        Self {
            columns,
            column_names,
            null_mask_len,
            fixed_payload_len,
            has_variable,
        }
    }

    /// Null mask width for a user column count. The mask covers the metadata
    /// columns as well, even though they are never null.
    pub fn null_mask_len_for(user_columns: usize) -> usize {
        (METADATA_COLUMN_COUNT + user_columns).div_ceil(8)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> Option<&ColumnDef> {
        self.columns.get(idx)
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn null_mask_len(&self) -> usize {
        self.null_mask_len
    }

    /// Exact serialized size of a row holding `values`, including the row
    /// header. Returns an error on arity or type mismatch so that the caller
    /// can reject the row before touching any block state.
    pub fn row_size(&self, values: &[Value]) -> eyre::Result<usize> {
        if values.len() != self.columns.len() {
            eyre::bail!(
                "row has {} values but schema has {} columns",
                values.len(),
                self.columns.len()
            );
        }

        let mut size = ROW_HEADER_SIZE + self.null_mask_len + METADATA_BYTES;
        if !self.has_variable {
            // Fast path: only null columns change the size.
            size += self.fixed_payload_len;
            for (value, col) in values.iter().zip(&self.columns) {
                self.check_type(value, col)?;
                if value.is_null() {
                    size -= col.data_type().export_width().unwrap_or(0);
                }
            }
            return Ok(size);
        }

        for (value, col) in values.iter().zip(&self.columns) {
            self.check_type(value, col)?;
            size += match value {
                Value::Null => 0,
                Value::Text(s) => VAR_LENGTH_PREFIX_SIZE + s.len(),
                Value::Blob(b) => VAR_LENGTH_PREFIX_SIZE + b.len(),
                _ => col.data_type().export_width().unwrap_or(0),
            };
        }
        Ok(size)
    }

    fn check_type(&self, value: &Value, col: &ColumnDef) -> eyre::Result<()> {
        if !value.matches_type(col.data_type()) {
            eyre::bail!(
                "value of type {} does not fit column {} of type {}",
                value.type_name(),
                col.name(),
                col.data_type().name()
            );
        }
        Ok(())
    }
}
