//! # Outflow Configuration Constants
//!
//! Constants here fall into two groups: the export row frame layout, which is
//! a wire contract shared with downstream readers, and the stream block
//! geometry, which is a local tuning knob. Frame constants must never change
//! without a coordinated generation advance on every stream.
//!
//! ## Dependency Graph
//!
//! ```text
//! ROW_HEADER_SIZE (4 bytes, i32 big-endian row length)
//!       │
//!       └─> row length field excludes itself; readers add it back
//!
//! METADATA_COLUMN_COUNT (6)
//!       │
//!       ├─> METADATA_BYTES (derived: count * METADATA_COLUMN_WIDTH)
//!       │
//!       └─> null mask width: ceil((METADATA_COLUMN_COUNT + user) / 8)
//!             Metadata columns occupy the low-numbered mask bits and are
//!             never null, but they still widen the mask.
//!
//! EXPORT_INT_WIDTH (8)
//!       │
//!       └─> every integer column widens to 8 bytes on the wire, whatever
//!           its declared storage width
//!
//! DEFAULT_BLOCK_CAPACITY (2 MiB)
//!       │
//!       └─> must hold at least one maximal fixed-width row or appends can
//!           never succeed
//! ```

// ============================================================================
// EXPORT ROW FRAME LAYOUT
// Wire contract with downstream readers. Do not change without a generation
// advance on every live stream.
// ============================================================================

/// Size of the per-row length header: a big-endian signed 32-bit count of the
/// bytes that follow it.
pub const ROW_HEADER_SIZE: usize = 4;

/// Number of metadata columns prepended to every exported row, in order:
/// txn id, timestamp, sequence, partition id, site id, operation kind.
pub const METADATA_COLUMN_COUNT: usize = 6;

/// Wire width of one metadata column.
pub const METADATA_COLUMN_WIDTH: usize = 8;

/// Total bytes of metadata per row.
pub const METADATA_BYTES: usize = METADATA_COLUMN_COUNT * METADATA_COLUMN_WIDTH;

/// Wire width of every integer-family user column. Narrow storage types
/// (int2, int4) widen to this on export.
pub const EXPORT_INT_WIDTH: usize = 8;

/// Size of the length prefix on variable-width columns (text, blob).
pub const VAR_LENGTH_PREFIX_SIZE: usize = 4;

const _: () = assert!(
    METADATA_BYTES == METADATA_COLUMN_COUNT * METADATA_COLUMN_WIDTH,
    "METADATA_BYTES derivation mismatch"
);

const _: () = assert!(
    METADATA_COLUMN_WIDTH == EXPORT_INT_WIDTH,
    "metadata columns are exported as wide integers"
);

// ============================================================================
// STREAM BLOCK GEOMETRY
// ============================================================================

/// Default capacity of a stream block. Blocks are the unit of hand-off to the
/// consumer; larger blocks amortize push overhead, smaller blocks bound the
/// consumer's latency.
pub const DEFAULT_BLOCK_CAPACITY: usize = 2 * 1024 * 1024;

const _: () = assert!(
    DEFAULT_BLOCK_CAPACITY > ROW_HEADER_SIZE + METADATA_BYTES + 64,
    "a stream block must hold at least one row"
);
