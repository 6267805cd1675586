//! Stream reassembly and record decoding.
//!
//! The transport hands over byte chunks of arbitrary size and alignment: one
//! record may be split across two deliveries, or several records may arrive
//! coalesced in one. [`Reassembler`] carries the unconsumed tail between
//! deliveries, slices complete records off the front, decodes them through the
//! [`RecordSchema`] and suppresses immediate timestamp repeats.
//!
//! Memory is bounded: after every delivery the carried tail is at most twice
//! the record width. A longer tail means the stream has lost framing (or the
//! iteration guard tripped) and the tail is discarded.

use serde::Serialize;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::types::{Record, RecordSchema};

/// Upper bound on records sliced from a single delivery.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Lifetime counters for a [`Reassembler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReassemblyStats {
    /// Non-empty deliveries processed
    pub deliveries: u64,
    /// Bytes received across all deliveries
    pub bytes_received: u64,
    /// Records handed to the consumer
    pub records_emitted: u64,
    /// Records skipped because their timestamp repeated the last one
    pub duplicates_suppressed: u64,
    /// Times the carried tail was discarded to regain framing
    pub resyncs: u64,
    /// Deliveries that hit the iteration guard
    pub guard_trips: u64,
    /// Times residue and duplicate state were cleared by [`Reassembler::reset`]
    pub resets: u64,
}

/// Reassembles fixed-width records from an arbitrarily chunked byte stream.
///
/// Not internally synchronized: deliveries and resets must not overlap. The
/// [`Driver`](crate::driver::Driver) guarantees this by owning the instance.
#[derive(Debug)]
pub struct Reassembler {
    schema: Arc<RecordSchema>,
    accumulator: Vec<u8>,
    last_timestamp: Option<u32>,
    max_iterations: usize,
    stats: ReassemblyStats,
}

impl Reassembler {
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        Self {
            accumulator: Vec::with_capacity(schema.record_width() * 2),
            schema,
            last_timestamp: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stats: ReassemblyStats::default(),
        }
    }

    /// Override the per-delivery iteration guard (clamped to at least 1).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Bytes carried over to the next delivery.
    pub fn residue(&self) -> &[u8] {
        &self.accumulator
    }

    /// Timestamp of the last record seen, `None` after a reset.
    pub fn last_timestamp(&self) -> Option<u32> {
        self.last_timestamp
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    /// Drop any carried bytes and forget the last timestamp.
    ///
    /// Call when a stream starts or stops and when the link goes down so residue from
    /// one session never prefixes the next.
    pub fn reset(&mut self) {
        self.accumulator.clear();
        self.last_timestamp = None;
        self.stats.resets += 1;
    }

    /// Process one delivery, invoking `emit` for every new record in arrival order.
    pub fn on_delivery<F>(&mut self, bytes: &[u8], mut emit: F)
    where
        F: FnMut(Record),
    {
        if bytes.is_empty() {
            return;
        }
        self.stats.deliveries += 1;
        self.stats.bytes_received += bytes.len() as u64;

        let width = self.schema.record_width();
        let mut combined = std::mem::take(&mut self.accumulator);
        combined.extend_from_slice(bytes);

        let mut offset = 0;
        let mut iterations = 0;
        while offset + width <= combined.len() && iterations < self.max_iterations {
            iterations += 1;
            let window = &combined[offset..offset + width];
            offset += width;

            let record = match self.schema.decode(window) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Dropping undecodable record window: {}", e);
                    continue;
                }
            };

            let timestamp = record.timestamp();
            if self.last_timestamp == Some(timestamp) {
                trace!(timestamp, "Suppressed duplicate record");
                self.stats.duplicates_suppressed += 1;
            } else {
                self.stats.records_emitted += 1;
                emit(record);
            }
            self.last_timestamp = Some(timestamp);
        }

        if offset + width <= combined.len() {
            self.stats.guard_trips += 1;
            warn!(
                max_iterations = self.max_iterations,
                pending = combined.len() - offset,
                "Iteration guard reached with complete records pending"
            );
        }

        combined.drain(..offset);
        if combined.len() > 2 * width {
            self.stats.resyncs += 1;
            warn!(
                discarded = combined.len(),
                record_width = width,
                "Stream out of sync, discarding buffered bytes"
            );
            combined.clear();
        }
        self.accumulator = combined;
    }

    /// Process one delivery and collect the emitted records.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Record> {
        let mut records = Vec::new();
        self.on_delivery(bytes, |record| records.push(record));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use proptest::prelude::*;

    const WIDTH: usize = 16;

    fn reassembler() -> Reassembler {
        Reassembler::new(Arc::new(RecordSchema::reference()))
    }

    fn record_bytes(seed: u16, time_ms: u32) -> Vec<u8> {
        let mut values: Vec<Value> = (0..6).map(|i| Value::UInt16(seed.wrapping_add(i))).collect();
        values.push(Value::UInt32(time_ms));
        RecordSchema::reference().encode(&values).unwrap()
    }

    fn timestamps(records: &[Record]) -> Vec<u32> {
        records.iter().map(Record::timestamp).collect()
    }

    #[test]
    fn two_back_to_back_records_in_one_delivery() {
        let mut r = reassembler();
        let mut bytes = record_bytes(100, 10);
        bytes.extend(record_bytes(200, 20));

        let records = r.feed(&bytes);
        assert_eq!(timestamps(&records), vec![10, 20]);
        assert_eq!(records[0].get::<u16>("reading1").unwrap(), 100);
        assert_eq!(records[0].get::<u16>("reading6").unwrap(), 105);
        assert_eq!(records[1].get::<u16>("reading1").unwrap(), 200);
        assert!(r.residue().is_empty());
    }

    #[test]
    fn record_split_across_deliveries() {
        let mut r = reassembler();
        let a = record_bytes(1, 1000);
        let b = record_bytes(2, 1001);

        assert!(r.feed(&a[..10]).is_empty());
        assert_eq!(r.residue().len(), 10);

        let mut rest = a[10..].to_vec();
        rest.extend_from_slice(&b);
        let records = r.feed(&rest);
        assert_eq!(timestamps(&records), vec![1000, 1001]);
        assert_eq!(records[0].bytes(), &a[..]);
        assert!(r.residue().is_empty());
    }

    #[test]
    fn identical_record_twice_is_emitted_once() {
        let mut r = reassembler();
        let a = record_bytes(7, 55);

        assert_eq!(r.feed(&a).len(), 1);
        assert!(r.feed(&a).is_empty());
        assert_eq!(r.stats().duplicates_suppressed, 1);
        assert_eq!(r.last_timestamp(), Some(55));
    }

    #[test]
    fn duplicate_only_matches_the_most_recent_timestamp() {
        let mut r = reassembler();
        let mut bytes = record_bytes(0, 1);
        bytes.extend(record_bytes(0, 2));
        bytes.extend(record_bytes(0, 1));
        bytes.extend(record_bytes(9, 1));

        assert_eq!(timestamps(&r.feed(&bytes)), vec![1, 2, 1]);
    }

    #[test]
    fn reset_forgets_last_timestamp_and_residue() {
        let mut r = reassembler();
        let a = record_bytes(3, 77);

        assert_eq!(r.feed(&a).len(), 1);
        r.feed(&a[..5]);
        assert_eq!(r.residue().len(), 5);

        r.reset();
        assert!(r.residue().is_empty());
        assert_eq!(r.last_timestamp(), None);
        assert_eq!(timestamps(&r.feed(&a)), vec![77]);
    }

    #[test]
    fn empty_delivery_changes_nothing() {
        let mut r = reassembler();
        let a = record_bytes(3, 9);
        r.feed(&a[..7]);
        let before = r.stats();

        assert!(r.feed(&[]).is_empty());
        assert_eq!(r.residue(), &a[..7]);
        assert_eq!(r.last_timestamp(), None);
        assert_eq!(r.stats(), before);

        assert_eq!(r.feed(&a[7..]).len(), 1);
        assert_eq!(r.stats().deliveries, 2);
    }

    #[test]
    fn exactly_one_record_width() {
        let mut r = reassembler();
        assert_eq!(r.feed(&record_bytes(1, 1)).len(), 1);
        assert!(r.residue().is_empty());
    }

    #[test]
    fn n_and_a_half_records_leave_half_a_record() {
        let mut r = reassembler();
        let mut bytes = Vec::new();
        for t in 0..3 {
            bytes.extend(record_bytes(t as u16, t));
        }
        bytes.extend_from_slice(&record_bytes(9, 9)[..WIDTH / 2]);

        assert_eq!(r.feed(&bytes).len(), 3);
        assert_eq!(r.residue().len(), WIDTH / 2);
    }

    #[test]
    fn unaligned_garbage_never_grows_the_buffer() {
        let mut r = reassembler();
        let garbage: Vec<u8> = (0..50u8).map(|b| b.wrapping_mul(37)).collect();

        r.feed(&garbage);
        assert_eq!(r.residue().len(), 50 % WIDTH);

        for _ in 0..100 {
            r.feed(&garbage);
            assert!(r.residue().len() <= 2 * WIDTH);
        }
    }

    #[test]
    fn guard_trip_discards_oversized_tail() {
        let mut r = reassembler().with_max_iterations(1);
        let garbage = vec![0xAAu8; 50];

        let records = r.feed(&garbage);
        assert_eq!(records.len(), 1);
        assert!(r.residue().is_empty());
        assert_eq!(r.stats().guard_trips, 1);
        assert_eq!(r.stats().resyncs, 1);
    }

    #[test]
    fn default_guard_never_trips_on_well_framed_input() {
        let mut r = reassembler();
        let mut bytes = Vec::new();
        for t in 0..DEFAULT_MAX_ITERATIONS as u32 {
            bytes.extend(record_bytes(0, t));
        }

        assert_eq!(r.feed(&bytes).len(), DEFAULT_MAX_ITERATIONS);
        assert_eq!(r.stats().guard_trips, 0);
        assert!(r.residue().is_empty());
    }

    #[test]
    fn default_guard_bounds_a_runaway_delivery() {
        let mut r = reassembler();
        let bytes = vec![0u8; (DEFAULT_MAX_ITERATIONS + 3) * WIDTH];

        // All-zero records share timestamp 0, so only the first is emitted
        assert_eq!(r.feed(&bytes).len(), 1);
        assert_eq!(r.stats().guard_trips, 1);
        assert!(r.residue().is_empty());
    }

    #[test]
    fn stats_survive_reset() {
        let mut r = reassembler();
        r.feed(&record_bytes(0, 1));
        r.reset();
        r.feed(&record_bytes(0, 1));

        let stats = r.stats();
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.records_emitted, 2);
        assert_eq!(stats.bytes_received, 2 * WIDTH as u64);
        assert_eq!(stats.resets, 1);
    }

    fn arb_stream() -> impl Strategy<Value = Vec<(u16, u32)>> {
        prop::collection::vec((any::<u16>(), 0u32..8), 0..40)
    }

    fn cut_points(len: usize, cuts: &[usize]) -> Vec<usize> {
        let mut points: Vec<usize> = cuts.iter().map(|c| c % (len + 1)).collect();
        points.push(0);
        points.push(len);
        points.sort_unstable();
        points
    }

    proptest! {
        #[test]
        fn prop_output_is_input_minus_immediate_repeats(records in arb_stream()) {
            let bytes: Vec<u8> = records.iter().flat_map(|(s, t)| record_bytes(*s, *t)).collect();
            let mut expected = Vec::new();
            let mut last = None;
            for (_, t) in &records {
                if last != Some(*t) {
                    expected.push(*t);
                }
                last = Some(*t);
            }

            let mut r = reassembler();
            prop_assert_eq!(timestamps(&r.feed(&bytes)), expected);
        }

        #[test]
        fn prop_partition_invariant(
            records in arb_stream(),
            cuts in prop::collection::vec(any::<usize>(), 0..20)
        ) {
            let bytes: Vec<u8> = records.iter().flat_map(|(s, t)| record_bytes(*s, *t)).collect();
            let whole = reassembler().feed(&bytes);

            let mut r = reassembler();
            let mut pieces = Vec::new();
            let points = cut_points(bytes.len(), &cuts);
            for pair in points.windows(2) {
                pieces.extend(r.feed(&bytes[pair[0]..pair[1]]));
            }

            prop_assert_eq!(pieces, whole);
            prop_assert!(r.residue().is_empty());
        }

        #[test]
        fn prop_residue_bounded(
            deliveries in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 0..30),
            guard in 1usize..8
        ) {
            let mut r = reassembler().with_max_iterations(guard);
            for chunk in &deliveries {
                r.feed(chunk);
                prop_assert!(r.residue().len() <= 2 * WIDTH);
            }
        }
    }
}
