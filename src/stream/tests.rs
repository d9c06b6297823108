//! Tests for the stream module

use super::*;
use crate::encoding::{RowMeta, StreamOp};
use crate::schema::ExportSchema;
use crate::types::{ColumnDef, DataType, Value};

#[derive(Default)]
struct CollectingTopEnd {
    blocks: Vec<StreamBlock>,
    pushes: usize,
    end_of_stream_signals: usize,
}

impl TopEnd for CollectingTopEnd {
    fn push_export_block(
        &mut self,
        _generation_id: i64,
        _partition_id: i32,
        _signature: &str,
        _column_names: &[String],
        block: Option<StreamBlock>,
        _sync: bool,
        end_of_stream: bool,
    ) {
        self.pushes += 1;
        if end_of_stream {
            self.end_of_stream_signals += 1;
        }
        if let Some(block) = block {
            self.blocks.push(block);
        }
    }

    fn queued_export_bytes(&self, _partition_id: i32, _signature: &str) -> u64 {
        self.blocks.iter().map(|b| b.raw_length() as u64).sum()
    }
}

fn int_schema(columns: usize) -> ExportSchema {
    ExportSchema::new(
        (0..columns)
            .map(|i| ColumnDef::new(format!("COLUMN{i}"), DataType::Int4))
            .collect(),
    )
}

fn meta() -> RowMeta {
    RowMeta {
        seq: 1,
        timestamp: 1,
        partition_id: 1,
        op: StreamOp::Insert,
    }
}

fn int_row(columns: usize) -> Vec<Value<'static>> {
    (0..columns as i64).map(Value::Int).collect()
}

mod block_tests {
    use super::*;

    #[test]
    fn reserve_advances_offset_and_respects_capacity() {
        let mut block = StreamBlock::new(0, 0, 100, 0);
        assert_eq!(block.raw_length(), 0);
        assert_eq!(block.remaining(), 100);

        block.reserve(60).unwrap();
        assert_eq!(block.raw_length(), 60);
        assert_eq!(block.remaining(), 40);

        let err = block.reserve(41).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StreamError>(),
            Some(StreamError::CapacityExceeded {
                requested: 41,
                available: 40
            })
        ));
        // A failed reservation leaves the cursor alone.
        assert_eq!(block.raw_length(), 60);

        block.reserve(40).unwrap();
        assert_eq!(block.remaining(), 0);
    }

    #[test]
    fn reserved_cursor_is_the_requested_window() {
        let mut block = StreamBlock::new(0, 7, 64, 0);
        let cursor = block.reserve(8).unwrap();
        cursor.copy_from_slice(&42u64.to_be_bytes());
        assert_eq!(block.data(), &42u64.to_be_bytes());
        assert_eq!(block.uso(), 7);
    }

    #[test]
    fn commit_watermark_never_retreats() {
        let mut block = StreamBlock::new(0, 0, 100, 0);
        block.reserve(80).unwrap();
        block.mark_committed(50);
        assert_eq!(block.committed_offset(), 50);
        block.mark_committed(30);
        assert_eq!(block.committed_offset(), 50);
        block.mark_committed(80);
        assert_eq!(block.committed_offset(), 80);
    }

    #[test]
    fn truncate_stops_at_committed_watermark() {
        let mut block = StreamBlock::new(0, 0, 100, 0);
        block.reserve(80).unwrap();
        block.mark_committed(50);

        block.truncate_to(60).unwrap();
        assert_eq!(block.raw_length(), 60);

        assert!(block.truncate_to(40).is_err());
        assert_eq!(block.raw_length(), 60);
    }
}

mod buffer_tests {
    use super::*;

    #[test]
    fn append_returns_an_advancing_uso_cursor() {
        let mut topend = CollectingTopEnd::default();
        let mut buffer = StreamBuffer::new(1, 1, int_schema(5));
        buffer.set_signature_and_generation(&mut topend, "s", 0).unwrap();

        let row = int_row(5);
        let uso = buffer
            .append(&mut topend, 0, 1, 0, &meta(), &row)
            .unwrap();
        assert_eq!(uso, 94);
        let uso = buffer
            .append(&mut topend, 1, 2, 0, &meta(), &row)
            .unwrap();
        assert_eq!(uso, 188);
    }

    #[test]
    fn oversized_row_is_rejected_without_touching_state() {
        let mut topend = CollectingTopEnd::default();
        let schema = ExportSchema::new(vec![ColumnDef::new("payload", DataType::Text)]);
        let mut buffer = StreamBuffer::new(1, 1, schema);
        buffer.set_default_capacity(1024).unwrap();
        buffer.set_signature_and_generation(&mut topend, "s", 0).unwrap();

        let big = "x".repeat(2000);
        let err = buffer
            .append(&mut topend, 0, 1, 0, &meta(), &[Value::text(&big)])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StreamError>(),
            Some(StreamError::RowTooLarge { .. })
        ));
        assert_eq!(buffer.allocated_byte_count(), 0);
        assert_eq!(buffer.open_txn_id(), None);

        // The buffer still works after the rejected append.
        buffer
            .append(&mut topend, 0, 1, 0, &meta(), &[Value::text("ok")])
            .unwrap();
    }

    #[test]
    fn capacity_change_with_buffered_data_is_rejected() {
        let mut topend = CollectingTopEnd::default();
        let mut buffer = StreamBuffer::new(1, 1, int_schema(5));
        buffer.set_signature_and_generation(&mut topend, "s", 0).unwrap();
        buffer
            .append(&mut topend, 0, 1, 0, &meta(), &int_row(5))
            .unwrap();

        let err = buffer.set_default_capacity(4096).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StreamError>(),
            Some(StreamError::CapacityMisconfig { buffered_bytes: 94 })
        ));

        // Draining the buffer makes the change legal again.
        buffer.periodic_flush(&mut topend, -1, 1, 1).unwrap();
        buffer.set_default_capacity(4096).unwrap();
        assert_eq!(buffer.default_capacity(), 4096);
    }

    #[test]
    fn generation_must_strictly_advance_on_catalog_update() {
        let mut topend = CollectingTopEnd::default();
        let mut buffer = StreamBuffer::new(1, 1, int_schema(5));
        buffer.set_signature_and_generation(&mut topend, "s", 5).unwrap();

        for stale in [5, 4] {
            let err = buffer
                .set_signature_and_generation(&mut topend, "s", stale)
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<StreamError>(),
                Some(StreamError::GenerationRegression {
                    current: 5,
                    ..
                })
            ));
        }
        assert_eq!(buffer.generation(), Some(5));

        buffer.set_signature_and_generation(&mut topend, "s", 6).unwrap();
        assert_eq!(buffer.generation(), Some(6));
    }

    #[test]
    fn rollback_to_pushed_bytes_is_rejected() {
        let mut topend = CollectingTopEnd::default();
        let mut buffer = StreamBuffer::new(1, 1, int_schema(5));
        buffer.set_signature_and_generation(&mut topend, "s", 0).unwrap();

        let stale = buffer.bytes_used();
        buffer
            .append(&mut topend, 0, 1, 0, &meta(), &int_row(5))
            .unwrap();
        buffer.periodic_flush(&mut topend, -1, 1, 1).unwrap();
        assert_eq!(topend.blocks.len(), 1);

        let err = buffer.rollback_to(&stale).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StreamError>(),
            Some(StreamError::RollbackTooFar { mark_uso: 0, .. })
        ));
    }

    #[test]
    fn transaction_ids_must_not_regress_while_open() {
        let mut topend = CollectingTopEnd::default();
        let mut buffer = StreamBuffer::new(1, 1, int_schema(5));
        buffer.set_signature_and_generation(&mut topend, "s", 0).unwrap();

        buffer
            .append(&mut topend, 0, 5, 0, &meta(), &int_row(5))
            .unwrap();
        assert!(buffer
            .append(&mut topend, 0, 3, 0, &meta(), &int_row(5))
            .is_err());
    }

    #[test]
    fn older_generation_rows_land_in_the_current_generation() {
        let mut topend = CollectingTopEnd::default();
        let mut buffer = StreamBuffer::new(1, 1, int_schema(5));
        buffer.set_signature_and_generation(&mut topend, "s", 12).unwrap();

        buffer
            .append(&mut topend, 0, 1, 10, &meta(), &int_row(5))
            .unwrap();
        buffer.periodic_flush(&mut topend, -1, 1, 1).unwrap();

        assert_eq!(topend.blocks.len(), 1);
        assert_eq!(topend.blocks[0].generation_id(), 12);
    }

    #[test]
    fn queued_bytes_report_tracks_pushed_blocks() {
        let mut topend = CollectingTopEnd::default();
        let mut buffer = StreamBuffer::new(1, 1, int_schema(5));
        buffer.set_signature_and_generation(&mut topend, "s", 0).unwrap();

        buffer
            .append(&mut topend, 0, 1, 0, &meta(), &int_row(5))
            .unwrap();
        assert_eq!(topend.queued_export_bytes(1, "s"), 0);
        buffer.periodic_flush(&mut topend, -1, 1, 1).unwrap();
        assert_eq!(topend.queued_export_bytes(1, "s"), 94);
    }
}
