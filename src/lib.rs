//! # Outflow - Transactional Export Stream Buffer
//!
//! Outflow is the export path of an embedded storage engine partition. The
//! transaction executor hands it row mutations as they happen; Outflow
//! serializes each row into a compact binary frame, accumulates frames in
//! fixed-size stream blocks, and hands completed blocks to an external
//! consumer once every byte in them is known to be committed.
//!
//! ## Quick Start
//!
//! ```ignore
//! use outflow::{ColumnDef, DataType, ExportSchema, RowMeta, StreamBuffer, StreamOp, Value};
//!
//! let schema = ExportSchema::new(vec![
//!     ColumnDef::new("id", DataType::Int8),
//!     ColumnDef::new("amount", DataType::Int8),
//! ]);
//! let mut buffer = StreamBuffer::new(0, 0, schema);
//! buffer.set_signature_and_generation(&mut topend, "orders", 1)?;
//!
//! let meta = RowMeta { seq: 1, timestamp: now, partition_id: 0, op: StreamOp::Insert };
//! buffer.append(&mut topend, 41, 42, 1, &meta, &[Value::Int(7), Value::Int(100)])?;
//! buffer.periodic_flush(&mut topend, -1, 42, 42)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      Transaction Executor (ext)      │
//! │  append / flush / rollback / catalog │
//! ├─────────────────────────────────────┤
//! │         StreamBuffer (stream)        │
//! │  txn + generation boundary tracking  │
//! ├──────────────────┬──────────────────┤
//! │ RowSerializer    │  StreamBlock     │
//! │ (encoding)       │  (stream)        │
//! ├──────────────────┴──────────────────┤
//! │        TopEnd consumer (ext)         │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Core Guarantees
//!
//! - The Universal Stream Offset (USO) of pushed blocks is contiguous and
//!   strictly increasing; downstream readers use it for ordering and gap
//!   detection.
//! - No pushed block contains bytes of a transaction that had not committed
//!   at push time.
//! - A stream-generation change (catalog update, export window advance) cuts
//!   the current block and signals end-of-stream for the old generation.
//! - Rollback erases the open transaction's byte suffix in place, even when
//!   that suffix spans multiple blocks.
//!
//! ## Module Overview
//!
//! - [`config`]: centralized constants with compile-time assertions
//! - [`types`]: data types and runtime values for exportable columns
//! - [`schema`]: export schema with precomputed frame layout
//! - [`encoding`]: the per-row export wire format
//! - [`stream`]: stream blocks, the stream buffer, the consumer boundary

pub mod config;
pub mod encoding;
pub mod schema;
pub mod stream;
pub mod types;

pub use encoding::{RowMeta, StreamOp};
pub use schema::ExportSchema;
pub use stream::{RollbackMark, StreamBlock, StreamBuffer, StreamError, TopEnd};
pub use types::{ColumnDef, DataType, Value};
