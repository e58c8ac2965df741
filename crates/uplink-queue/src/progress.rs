//! Progress aggregation.
//!
//! Per-item progress is derived from transport signals; the total is
//! recomputed from scratch over the uploading items on every signal.

// Byte counts are far below 2^52
#![allow(clippy::cast_precision_loss)]

use uplink_core::{ChunkStatus, ItemStatus, TransferRecord, UploadItem};

/// Aggregate progress snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TotalProgress {
    pub progress: f64,
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

fn percent(sent: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        (sent as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Overall percentage over every item in UPLOADING.
///
/// Each item contributes `max(total_bytes, size)` to the denominator, with
/// an unknown `total_bytes` treated as `size`. An empty set reports 100.
pub fn aggregate<'a>(items: impl IntoIterator<Item = &'a UploadItem>) -> TotalProgress {
    let (bytes_sent, total_bytes) = items
        .into_iter()
        .filter(|item| item.status == ItemStatus::Uploading)
        .fold((0u64, 0u64), |(sent, total), item| {
            let size = item.size();
            let (item_sent, item_total) = item.transfer.as_ref().map_or((0, size), |record| {
                (record.bytes_sent, record.total_bytes.unwrap_or(size).max(size))
            });
            (sent + item_sent, total + item_total)
        });

    TotalProgress {
        progress: percent(bytes_sent, total_bytes),
        bytes_sent,
        total_bytes,
    }
}

/// Apply a whole-request progress signal to one member of the request.
pub fn record_request_progress(record: &mut TransferRecord, bytes_sent: u64, total_bytes: u64) {
    record.bytes_sent = bytes_sent;
    record.total_bytes = Some(total_bytes);
    record.progress = percent(bytes_sent, total_bytes);
}

/// Apply a chunk-request progress signal and recompute the item totals.
pub fn record_chunk_progress(
    record: &mut TransferRecord,
    size: u64,
    index: usize,
    bytes_sent: u64,
) {
    if let Some(chunk) = record.chunks.get_mut(index) {
        chunk.bytes_sent = bytes_sent.min(chunk.len);
    }
    refresh_chunked(record, size);
}

/// Mark a chunk acknowledged and recompute the item totals.
pub fn record_chunk_acked(record: &mut TransferRecord, size: u64, index: usize) {
    if let Some(chunk) = record.chunks.get_mut(index) {
        chunk.status = ChunkStatus::Acked;
        chunk.bytes_sent = chunk.len;
        chunk.handle = None;
    }
    refresh_chunked(record, size);
}

fn refresh_chunked(record: &mut TransferRecord, size: u64) {
    record.sum_chunk_bytes();
    record.total_bytes = Some(size);
    record.progress = percent(record.bytes_sent, size);
}

/// Report an item as fully sent.
pub fn record_complete(record: &mut TransferRecord, size: u64) {
    let total = record.total_bytes.unwrap_or(size).max(size);
    record.bytes_sent = total;
    record.total_bytes = Some(total);
    record.progress = 100.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplink_core::{ChunkRecord, ItemId, ItemSource};

    fn uploading(id: u64, size: usize) -> UploadItem {
        let mut item = UploadItem::new(ItemId::new(id), ItemSource::new("f", "", vec![0u8; size]));
        item.status = ItemStatus::Uploading;
        item.transfer = Some(TransferRecord::new("f"));
        item
    }

    fn report(item: &mut UploadItem, sent: u64, total: u64) {
        record_request_progress(item.transfer.as_mut().unwrap(), sent, total);
    }

    #[test]
    fn test_total_uses_max_of_wire_total_and_size() {
        let mut a = uploading(1, 1990);
        let mut b = uploading(2, 1990);

        report(&mut a, 400, 2000);
        report(&mut b, 200, 2000);
        assert!((aggregate([&a, &b]).progress - 15.0).abs() < 1e-9);

        report(&mut a, 2000, 2000);
        report(&mut b, 1900, 2000);
        assert!((aggregate([&a, &b]).progress - 97.5).abs() < 1e-9);

        report(&mut b, 2000, 2000);
        let total = aggregate([&a, &b]);
        assert!((total.progress - 100.0).abs() < 1e-9);
        assert_eq!(total.total_bytes, 4000);
    }

    #[test]
    fn test_unknown_total_counts_as_size() {
        let mut a = uploading(1, 100);
        let b = uploading(2, 100);
        report(&mut a, 50, 100);
        let total = aggregate([&a, &b]);
        assert_eq!(total.total_bytes, 200);
        assert!((total.progress - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_only_uploading_items_count() {
        let mut done = uploading(1, 100);
        done.status = ItemStatus::Success;
        let total = aggregate([&done]);
        assert_eq!(total.total_bytes, 0);
        assert!((total.progress - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_chunk_progress() {
        let mut record = TransferRecord::new("f");
        record.chunked = true;
        record.chunks = vec![ChunkRecord::new(0, 0, 4), ChunkRecord::new(1, 4, 4)];

        record_chunk_progress(&mut record, 8, 0, 10);
        assert_eq!(record.bytes_sent, 4);
        assert!((record.progress - 50.0).abs() < f64::EPSILON);

        record_chunk_acked(&mut record, 8, 1);
        assert_eq!(record.bytes_sent, 8);
        assert_eq!(record.acked_chunks(), 1);
    }

    #[test]
    fn test_complete_sets_full_progress() {
        let mut record = TransferRecord::new("f");
        record_request_progress(&mut record, 10, 120);
        record_complete(&mut record, 100);
        assert_eq!(record.bytes_sent, 120);
        assert!((record.progress - 100.0).abs() < f64::EPSILON);
    }
}
