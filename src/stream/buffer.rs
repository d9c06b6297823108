//! # Stream Buffer
//!
//! `StreamBuffer` is the core of the export path. The partition executor
//! calls it once per row mutation, once per flush tick, on every transaction
//! abort, and on every catalog change. The buffer serializes rows into the
//! current block, decides when a block must be cut, and hands cut blocks to
//! the `TopEnd` consumer.
//!
//! ## Universal Stream Offset
//!
//! The buffer maintains the stream head `uso`, the count of bytes ever
//! produced by this partition's stream. Every block records the USO of its
//! first byte; successive pushed blocks cover contiguous, strictly
//! increasing USO ranges. Rollback moves the head backwards; a push never
//! does.
//!
//! ## Transactional Discipline
//!
//! The suffix `[committed_offset, offset)` of the current block belongs to
//! the open transaction, if any. Commit is observed lazily, two ways: a
//! later call reporting `last_committed >= open_txn`, or a call carrying a
//! higher current txn id. The partition executes serially, so a new txn id
//! implies the previous transaction ended, and an abort would have rolled
//! its bytes back before the new transaction started. A block is pushed
//! only when every byte in it is committed, with one deliberate exception:
//! a generation cut ships the block whole, because catalog changes happen
//! at executor-level safe points.
//!
//! ## Multi-Block Open Transactions
//!
//! A transaction larger than one block rolls the filled block into a pending
//! chain instead of pushing it. The chain is promoted and pushed, in USO
//! order, the moment the transaction is observed committed; on rollback the
//! chain is discarded wholesale and its memory freed. Rollback marks carry
//! block identity, not just a byte count, so a mark stays meaningful when
//! the tail it protects spans blocks.
//!
//! ## Block State Machine
//!
//! ```text
//!             append                    append(committed >= open)
//!   Empty ──────────> Open-Txn-Pending ─────────────> All-Committed
//!     ^                    │  rollback_to(committed)        │
//!     │                    └────────────────────────────────┤
//!     │                                                     │ periodic_flush
//!     │        set_signature_and_generation /               v
//!     └─────── append(generation advance) ─────────────── Sealed
//!                      (end-of-stream)
//! ```

use std::collections::VecDeque;

use eyre::Result;
use tracing::{debug, trace};

use crate::config::{DEFAULT_BLOCK_CAPACITY, METADATA_BYTES, ROW_HEADER_SIZE};
use crate::encoding::{write_row, RowMeta};
use crate::schema::ExportSchema;
use crate::types::Value;

use super::{StreamBlock, StreamError, TopEnd};

/// Opaque position in the stream, captured by [`StreamBuffer::bytes_used`]
/// and consumed by [`StreamBuffer::rollback_to`].
///
/// A mark pairs block identity with an in-block offset; a plain byte count
/// would go stale the moment an open transaction spills into a second block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollbackMark {
    uso: u64,
    block_id: u64,
    offset: usize,
}

/// Transactional export stream buffer for one partition.
pub struct StreamBuffer {
    partition_id: i32,
    site_id: i64,
    schema: ExportSchema,
    signature: String,
    /// None until the first catalog load establishes a generation.
    generation: Option<i64>,
    default_capacity: usize,
    /// Stream head: bytes ever produced, net of rollbacks.
    uso: u64,
    next_block_id: u64,
    current: Option<StreamBlock>,
    /// Filled blocks spanned by the open transaction, oldest first.
    pending: VecDeque<StreamBlock>,
    open_txn_id: Option<i64>,
    last_committed_txn_id: i64,
}

impl StreamBuffer {
    pub fn new(partition_id: i32, site_id: i64, schema: ExportSchema) -> Self {
        Self {
            partition_id,
            site_id,
            schema,
            signature: String::new(),
            generation: None,
            default_capacity: DEFAULT_BLOCK_CAPACITY,
            uso: 0,
            next_block_id: 0,
            current: None,
            pending: VecDeque::new(),
            open_txn_id: None,
            last_committed_txn_id: i64::MIN,
        }
    }

    /// Serializes one row into the stream on behalf of `current_txn` and
    /// returns the new USO cursor.
    ///
    /// May first absorb a commit, cut the current block on a generation
    /// advance, or roll into a new block on capacity overflow. Fails with
    /// [`StreamError::RowTooLarge`] when the row cannot fit an empty block;
    /// a failed append leaves the buffer untouched.
    pub fn append<T: TopEnd>(
        &mut self,
        topend: &mut T,
        last_committed_txn: i64,
        current_txn: i64,
        generation: i64,
        meta: &RowMeta,
        values: &[Value<'_>],
    ) -> Result<u64> {
        let row_size = self.schema.row_size(values)?;
        if row_size > self.default_capacity {
            return Err(StreamError::RowTooLarge {
                row_size,
                capacity: self.default_capacity,
            }
            .into());
        }
        if let Some(open) = self.open_txn_id {
            eyre::ensure!(
                current_txn >= open,
                "append for txn {} regresses behind open txn {}",
                current_txn,
                open
            );
        }

        self.last_committed_txn_id = self.last_committed_txn_id.max(last_committed_txn);
        self.observe_commit(topend, last_committed_txn, current_txn);

        match self.generation {
            None => self.generation = Some(generation),
            Some(current) if generation > current => {
                self.cut_for_generation(topend, current, generation);
            }
            // Rows tagged with an older export window land in the current
            // generation; the buffer's tag is authoritative after a cut.
            _ => {}
        }

        self.ensure_row_space(topend, row_size)?;
        let block = match self.current.as_mut() {
            Some(block) => block,
            None => eyre::bail!("no writable block after reservation"),
        };
        let cursor = block.reserve(row_size)?;
        write_row(cursor, &self.schema, current_txn, self.site_id, meta, values)?;

        self.uso += row_size as u64;
        self.open_txn_id = Some(current_txn);
        Ok(self.uso)
    }

    /// Flush tick from the executor. Absorbs commits reported through the
    /// txn ids and, once every resident byte is committed, cuts and pushes
    /// the current block.
    ///
    /// `tick_hint` is the executor's clock; a negative hint is the
    /// mandatory-flush convention. Age-based throttling lives upstream, so
    /// every tick that reaches this buffer flushes.
    pub fn periodic_flush<T: TopEnd>(
        &mut self,
        topend: &mut T,
        tick_hint: i64,
        committed_through: i64,
        current_txn: i64,
    ) -> Result<()> {
        trace!(tick_hint, committed_through, current_txn, "flush tick");
        if let Some(open) = self.open_txn_id {
            eyre::ensure!(
                current_txn >= open,
                "flush for txn {} regresses behind open txn {}",
                current_txn,
                open
            );
        }
        self.last_committed_txn_id = self.last_committed_txn_id.max(committed_through);
        self.observe_commit(topend, committed_through, current_txn);

        let ready = self
            .current
            .as_ref()
            .is_some_and(|b| b.raw_length() > 0 && b.committed_offset() == b.raw_length());
        if ready {
            if let Some(block) = self.current.take() {
                self.push_block(topend, block, false);
            }
        }
        Ok(())
    }

    /// Erases the stream tail back to `mark`, discarding any pending blocks
    /// the tail spans, and clears the open transaction.
    ///
    /// Fails with [`StreamError::RollbackTooFar`] if the mark refers to
    /// bytes already pushed or already committed; the buffer is left
    /// untouched on failure.
    pub fn rollback_to(&mut self, mark: &RollbackMark) -> Result<()> {
        eyre::ensure!(
            mark.uso <= self.uso,
            "rollback mark at uso {} is beyond the stream head {}",
            mark.uso,
            self.uso
        );

        if mark.uso == self.uso {
            // Empty tail; only the open-transaction tracking resets.
            self.open_txn_id = None;
            return Ok(());
        }

        if let Some(block) = self.current.as_mut() {
            if mark.uso >= block.uso() {
                let local = (mark.uso - block.uso()) as usize;
                if local < block.committed_offset() {
                    return Err(StreamError::RollbackTooFar {
                        mark_uso: mark.uso,
                        reachable_uso: block.uso() + block.committed_offset() as u64,
                    }
                    .into());
                }
                debug_assert!(mark.uso == block.uso() || mark.block_id == block.id());
                debug_assert!(mark.block_id != block.id() || mark.offset == local);
                block.truncate_to(local)?;
                debug!(to_uso = mark.uso, "rolled back tail within current block");
                self.uso = mark.uso;
                self.open_txn_id = None;
                return Ok(());
            }
        }

        // The mark predates the current block: unwind the pending chain.
        let Some(pos) = self.pending.iter().rposition(|b| b.uso() <= mark.uso) else {
            let reachable = self
                .pending
                .front()
                .or(self.current.as_ref())
                .map_or(self.uso, StreamBlock::uso);
            return Err(StreamError::RollbackTooFar {
                mark_uso: mark.uso,
                reachable_uso: reachable,
            }
            .into());
        };
        let local = (mark.uso - self.pending[pos].uso()) as usize;
        if local < self.pending[pos].committed_offset() {
            return Err(StreamError::RollbackTooFar {
                mark_uso: mark.uso,
                reachable_uso: self.pending[pos].uso()
                    + self.pending[pos].committed_offset() as u64,
            }
            .into());
        }
        debug_assert!(mark.uso == self.pending[pos].uso() || mark.block_id == self.pending[pos].id());
        debug_assert!(mark.block_id != self.pending[pos].id() || mark.offset == local);

        let discarded = self.pending.len() - pos - 1 + usize::from(self.current.is_some());
        self.current = None;
        self.pending.truncate(pos + 1);
        let mut block = match self.pending.pop_back() {
            Some(block) => block,
            None => eyre::bail!("pending chain emptied while unwinding rollback"),
        };
        block.truncate_to(local)?;
        debug!(
            to_uso = mark.uso,
            discarded_blocks = discarded,
            "rolled back tail across pending chain"
        );
        self.current = Some(block);
        self.uso = mark.uso;
        self.open_txn_id = None;
        Ok(())
    }

    /// Catalog update: ends the current stream generation and starts a new
    /// one under `signature` / `generation`.
    ///
    /// The first call only establishes identity. Later calls push everything
    /// in flight, whole, with end-of-stream set; an empty buffer still sends
    /// the end-of-stream signal (with no block). The generation must
    /// strictly advance.
    pub fn set_signature_and_generation<T: TopEnd>(
        &mut self,
        topend: &mut T,
        signature: &str,
        generation: i64,
    ) -> Result<()> {
        match self.generation {
            None => {
                self.signature = signature.to_string();
                self.generation = Some(generation);
                Ok(())
            }
            Some(current) => {
                if generation <= current {
                    return Err(StreamError::GenerationRegression {
                        requested: generation,
                        current,
                    }
                    .into());
                }
                self.cut_for_generation(topend, current, generation);
                self.signature = signature.to_string();
                Ok(())
            }
        }
    }

    /// Rollback mark at the current stream head.
    pub fn bytes_used(&self) -> RollbackMark {
        match self.current.as_ref() {
            Some(block) => {
                debug_assert_eq!(block.uso() + block.raw_length() as u64, self.uso);
                RollbackMark {
                    uso: self.uso,
                    block_id: block.id(),
                    offset: block.raw_length(),
                }
            }
            // No block in flight: the mark names the block that will be
            // created next, at offset zero.
            None => RollbackMark {
                uso: self.uso,
                block_id: self.next_block_id,
                offset: 0,
            },
        }
    }

    /// Bytes held by locally-owned blocks. Pushed blocks are the consumer's
    /// and are not counted.
    pub fn allocated_byte_count(&self) -> u64 {
        let pending: u64 = self.pending.iter().map(|b| b.raw_length() as u64).sum();
        pending + self.current.as_ref().map_or(0, |b| b.raw_length() as u64)
    }

    /// Sets the capacity used for blocks created from now on. Only legal
    /// while the buffer holds no data.
    pub fn set_default_capacity(&mut self, capacity: usize) -> Result<()> {
        let buffered = self.allocated_byte_count();
        if buffered > 0 {
            return Err(StreamError::CapacityMisconfig {
                buffered_bytes: buffered,
            }
            .into());
        }
        eyre::ensure!(
            capacity > ROW_HEADER_SIZE + METADATA_BYTES,
            "capacity {} cannot hold a single row frame",
            capacity
        );
        self.default_capacity = capacity;
        // Drop an empty preallocated block so the next block picks up the
        // new geometry.
        self.current = None;
        Ok(())
    }

    pub fn generation(&self) -> Option<i64> {
        self.generation
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn open_txn_id(&self) -> Option<i64> {
        self.open_txn_id
    }

    pub fn last_committed_txn_id(&self) -> i64 {
        self.last_committed_txn_id
    }

    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    pub fn schema(&self) -> &ExportSchema {
        &self.schema
    }

    /// Folds the txn ids carried by an append or flush into the commit
    /// state. The open transaction is absorbed when the committed horizon
    /// reaches it, or when a newer txn id shows up: execution is serial, so
    /// a new transaction means the old one ended, and an abort would have
    /// rolled its bytes back already.
    fn observe_commit<T: TopEnd>(&mut self, topend: &mut T, last_committed: i64, current: i64) {
        let Some(open) = self.open_txn_id else {
            // Any resident tail belongs to transactions that already ended;
            // rollback would have erased it otherwise.
            self.absorb_committed(topend);
            return;
        };
        if current > open {
            trace!(txn = open, "txn id advanced, absorbing committed tail");
            self.absorb_committed(topend);
            self.open_txn_id = Some(current);
        }
        if let Some(open) = self.open_txn_id {
            if open <= last_committed {
                trace!(txn = open, "committed horizon reached, absorbing tail");
                self.absorb_committed(topend);
                self.open_txn_id = None;
            }
        }
    }

    /// Promotes the pending chain and the current tail to committed and
    /// pushes every chained block, in USO order.
    fn absorb_committed<T: TopEnd>(&mut self, topend: &mut T) {
        while let Some(mut block) = self.pending.pop_front() {
            let len = block.raw_length();
            block.mark_committed(len);
            self.push_block(topend, block, false);
        }
        if let Some(block) = self.current.as_mut() {
            let len = block.raw_length();
            block.mark_committed(len);
        }
    }

    /// Ends the old generation: pushes everything in flight with
    /// end-of-stream, or a bare end-of-stream signal if nothing is, then
    /// adopts the new generation.
    fn cut_for_generation<T: TopEnd>(
        &mut self,
        topend: &mut T,
        old_generation: i64,
        new_generation: i64,
    ) {
        debug!(old_generation, new_generation, "generation advance cuts the stream");
        while let Some(mut block) = self.pending.pop_front() {
            let len = block.raw_length();
            block.mark_committed(len);
            self.push_block(topend, block, false);
        }
        match self.current.take() {
            Some(mut block) if block.raw_length() > 0 => {
                // Catalog changes happen at executor safe points; the block
                // ships whole, open tail included.
                let len = block.raw_length();
                block.mark_committed(len);
                self.push_block(topend, block, true);
            }
            _ => {
                topend.push_export_block(
                    old_generation,
                    self.partition_id,
                    &self.signature,
                    self.schema.column_names(),
                    None,
                    false,
                    true,
                );
            }
        }
        self.open_txn_id = None;
        self.generation = Some(new_generation);
    }

    /// Makes sure the current block can take `need` more bytes, rolling into
    /// a fresh block when it cannot.
    fn ensure_row_space<T: TopEnd>(&mut self, topend: &mut T, need: usize) -> Result<()> {
        if let Some(block) = self.current.take() {
            if block.remaining() >= need {
                self.current = Some(block);
                return Ok(());
            }
            if block.committed_offset() < block.raw_length() {
                // An uncommitted tail spills into the next block. Chain the
                // filled block instead of pushing so the whole suffix stays
                // erasable by rollback.
                trace!(
                    uso = block.uso(),
                    length = block.raw_length(),
                    "open transaction spans blocks, chaining"
                );
                self.pending.push_back(block);
            } else if block.raw_length() > 0 {
                self.push_block(topend, block, false);
            }
        }
        let block = self.new_block();
        self.current = Some(block);
        Ok(())
    }

    fn new_block(&mut self) -> StreamBlock {
        let id = self.next_block_id;
        self.next_block_id += 1;
        StreamBlock::new(
            id,
            self.uso,
            self.default_capacity,
            self.generation.unwrap_or(0),
        )
    }

    fn push_block<T: TopEnd>(&mut self, topend: &mut T, block: StreamBlock, end_of_stream: bool) {
        debug_assert_eq!(
            block.committed_offset(),
            block.raw_length(),
            "pushed blocks must be fully committed"
        );
        debug!(
            uso = block.uso(),
            length = block.raw_length(),
            generation = block.generation_id(),
            end_of_stream,
            "pushing stream block"
        );
        topend.push_export_block(
            block.generation_id(),
            self.partition_id,
            &self.signature,
            self.schema.column_names(),
            Some(block),
            false,
            end_of_stream,
        );
    }
}
