//! The consumer boundary.
//!
//! The "top end" is whatever persists and delivers completed stream blocks.
//! It is handed each block synchronously on the caller's thread and owns the
//! block from then on; any asynchrony or queueing lives behind this trait.

use super::StreamBlock;

pub trait TopEnd {
    /// Receives one completed block, taking ownership of it.
    ///
    /// `block` is `None` when a generation ends without an in-flight block;
    /// the call then only carries the `end_of_stream` signal. `sync` requests
    /// a durability fence. `end_of_stream` means no further blocks will ever
    /// arrive under this block's generation.
    #[allow(clippy::too_many_arguments)]
    fn push_export_block(
        &mut self,
        generation_id: i64,
        partition_id: i32,
        signature: &str,
        column_names: &[String],
        block: Option<StreamBlock>,
        sync: bool,
        end_of_stream: bool,
    );

    /// Bytes queued behind this partition's stream, for upstream throttling.
    /// Strictly informational.
    fn queued_export_bytes(&self, partition_id: i32, signature: &str) -> u64;
}
