//! # Export Stream Core
//!
//! This module contains the stream buffer and its collaborators:
//!
//! - [`StreamBlock`]: an owned byte region with framing cursors, the unit of
//!   hand-off to the consumer
//! - [`StreamBuffer`]: accepts per-row appends, enforces transactional and
//!   generational boundaries, cuts and pushes blocks
//! - [`TopEnd`]: the consumer boundary receiving completed blocks
//!
//! ## Ownership Model
//!
//! A block belongs to the stream buffer from creation until it is pushed;
//! `TopEnd::push_export_block` takes it by value and the consumer owns it
//! from then on. Blocks discarded by rollback free their memory immediately.
//!
//! ## Scheduling Model
//!
//! Single-threaded cooperative. The buffer is owned by one partition
//! executor; every operation runs to completion with no internal suspension
//! points and pushes synchronously on the caller's thread.

mod block;
mod buffer;
mod topend;

#[cfg(test)]
mod tests;

pub use block::StreamBlock;
pub use buffer::{RollbackMark, StreamBuffer};
pub use topend::TopEnd;

/// Error kinds raised by the stream core.
///
/// Every kind is a programmer error or resource exhaustion; none is retried
/// internally and a failed operation leaves the buffer untouched. Carried
/// inside [`eyre::Report`] so callers can downcast to the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// A serialized row cannot fit an empty block of the default capacity.
    RowTooLarge { row_size: usize, capacity: usize },
    /// A block reservation would overrun the block's capacity.
    CapacityExceeded { requested: usize, available: usize },
    /// A rollback mark refers to bytes already pushed or already committed.
    RollbackTooFar { mark_uso: u64, reachable_uso: u64 },
    /// A catalog update tried to move the stream generation backwards.
    GenerationRegression { requested: i64, current: i64 },
    /// The default capacity was changed while the buffer held data.
    CapacityMisconfig { buffered_bytes: u64 },
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::RowTooLarge { row_size, capacity } => write!(
                f,
                "serialized row of {row_size} bytes exceeds block capacity {capacity}"
            ),
            StreamError::CapacityExceeded {
                requested,
                available,
            } => write!(
                f,
                "block reservation of {requested} bytes exceeds remaining capacity {available}"
            ),
            StreamError::RollbackTooFar {
                mark_uso,
                reachable_uso,
            } => write!(
                f,
                "rollback mark at uso {mark_uso} predates the oldest erasable byte at uso {reachable_uso}"
            ),
            StreamError::GenerationRegression { requested, current } => write!(
                f,
                "generation {requested} does not advance current generation {current}"
            ),
            StreamError::CapacityMisconfig { buffered_bytes } => write!(
                f,
                "default capacity changed while {buffered_bytes} bytes are buffered"
            ),
        }
    }
}

impl std::error::Error for StreamError {}
