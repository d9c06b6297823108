//! # Export Row Wire Format
//!
//! This module owns the byte layout of one exported row. The layout is a
//! wire contract: downstream readers decode it with no schema negotiation
//! beyond the column list carried on each block push.
//!
//! ## Row Binary Layout
//!
//! ```text
//! +-------------+-------------+--------------------+------------------+
//! | Row Length  | Null Mask   | Metadata Columns   | User Columns     |
//! | (i32 BE)    | [u8; M]     | 6 x i64 BE         | schema order     |
//! +-------------+-------------+--------------------+------------------+
//! ```
//!
//! | Component | Description |
//! |-----------|-------------|
//! | **Row Length** | Bytes after this field; big-endian signed 32-bit |
//! | **Null Mask** | `ceil((6 + N) / 8)` bytes, MSB-first, bit set = NULL |
//! | **Metadata** | txn id, timestamp, sequence, partition, site, op kind |
//! | **User Columns** | integers widened to i64 BE, float8 as IEEE bits BE, text/blob with i32 BE length prefix |
//!
//! NULL user columns contribute their mask bit and no payload bytes. The
//! metadata columns occupy mask bits 0..5 and are never null.
//!
//! ## Module Structure
//!
//! - `row`: `RowMeta`, `StreamOp`, and the cursor-based serializer

mod row;

pub use row::{write_row, RowMeta, StreamOp};
