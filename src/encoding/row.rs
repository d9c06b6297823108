//! Cursor-based serializer for one export row.
//!
//! The serializer is pure and allocation-free: the caller reserves exactly
//! [`ExportSchema::row_size`] bytes out of a stream block and `write_row`
//! fills them. Sizing and writing are split so a failed append can be
//! rejected before any block state changes.

use eyre::Result;
use zerocopy::byteorder::{BigEndian, I32, I64};
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::config::{METADATA_BYTES, METADATA_COLUMN_COUNT, ROW_HEADER_SIZE};
use crate::schema::ExportSchema;
use crate::types::Value;

/// Kind of mutation an exported row represents.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOp {
    Insert = 1,
    Delete = 2,
}

impl StreamOp {
    /// Wire value of the operation-kind metadata column.
    pub fn code(&self) -> i64 {
        *self as i64
    }
}

/// Per-row metadata supplied by the executor alongside the column values.
///
/// The remaining two metadata columns, txn id and site id, come from the
/// append call and the stream buffer respectively.
#[derive(Debug, Clone, Copy)]
pub struct RowMeta {
    pub seq: i64,
    pub timestamp: i64,
    pub partition_id: i32,
    pub op: StreamOp,
}

/// The six fixed metadata columns, in wire order.
#[repr(C)]
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, Immutable)]
struct RowMetadataFrame {
    txn_id: I64<BigEndian>,
    timestamp: I64<BigEndian>,
    seq: I64<BigEndian>,
    partition_id: I64<BigEndian>,
    site_id: I64<BigEndian>,
    op: I64<BigEndian>,
}

const _: () = assert!(
    std::mem::size_of::<RowMetadataFrame>() == METADATA_BYTES,
    "metadata frame layout drifted from the wire contract"
);

/// Serializes one row into `dst`, which must be exactly
/// [`ExportSchema::row_size`] bytes for these values. Values must already
/// have passed the schema's type check; `row_size` performs it.
pub fn write_row(
    dst: &mut [u8],
    schema: &ExportSchema,
    txn_id: i64,
    site_id: i64,
    meta: &RowMeta,
    values: &[Value],
) -> Result<()> {
    let body_len = dst.len() - ROW_HEADER_SIZE;
    dst[..ROW_HEADER_SIZE].copy_from_slice(I32::<BigEndian>::new(body_len as i32).as_bytes());

    let (mask, payload) = dst[ROW_HEADER_SIZE..].split_at_mut(schema.null_mask_len());
    mask.fill(0);

    let frame = RowMetadataFrame {
        txn_id: I64::new(txn_id),
        timestamp: I64::new(meta.timestamp),
        seq: I64::new(meta.seq),
        partition_id: I64::new(i64::from(meta.partition_id)),
        site_id: I64::new(site_id),
        op: I64::new(meta.op.code()),
    };
    payload[..METADATA_BYTES].copy_from_slice(frame.as_bytes());

    let mut at = METADATA_BYTES;
    for (idx, value) in values.iter().enumerate() {
        match value {
            Value::Null => set_null_bit(mask, idx),
            Value::Int(v) => at = put(payload, at, &v.to_be_bytes()),
            Value::Float(v) => at = put(payload, at, &v.to_be_bytes()),
            Value::Timestamp(v) => at = put(payload, at, &v.to_be_bytes()),
            Value::Text(s) => {
                at = put(payload, at, I32::<BigEndian>::new(s.len() as i32).as_bytes());
                at = put(payload, at, s.as_bytes());
            }
            Value::Blob(b) => {
                at = put(payload, at, I32::<BigEndian>::new(b.len() as i32).as_bytes());
                at = put(payload, at, b);
            }
        }
    }
    debug_assert_eq!(at, payload.len(), "serialized row size drifted from row_size");

    Ok(())
}

fn put(payload: &mut [u8], at: usize, bytes: &[u8]) -> usize {
    payload[at..at + bytes.len()].copy_from_slice(bytes);
    at + bytes.len()
}

/// Null mask bits are MSB-first over metadata columns then user columns.
fn set_null_bit(mask: &mut [u8], user_idx: usize) {
    let bit = METADATA_COLUMN_COUNT + user_idx;
    mask[bit / 8] |= 0x80 >> (bit % 8);
}
