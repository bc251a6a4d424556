//! [`StreamAligner`] – byte-stream synchroniser.
//!
//! A serial link has no framing of its own. The hardware repeatedly emits a
//! fixed alignment marker until the host acknowledges it, then streams
//! fixed-width records back to back.
//!
//! ```text
//!  UNALIGNED ── marker found ──▶ ALIGNED
//!      ▲                            │
//!      └────────── reset() ─────────┘
//! ```
//!
//! While unaligned every chunk is appended to a bounded buffer that is
//! rescanned for the marker, so a marker split across any number of chunks is
//! still found. Once aligned, the buffer is consumed strictly positionally in
//! record-width steps; marker-like bytes inside records are data.

use tracing::{debug, trace, warn};

use crate::LayoutError;
use crate::layout::{Record, RecordLayout};

/// Marker emitted by the LiDAR sensor hub before its record stream.
pub const LIDAR_MARKER: [u8; 8] = [0x52, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59];

/// Bytes retained while searching for the marker.
pub const DEFAULT_BUFFER_CAP: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignState {
    Unaligned,
    Aligned,
}

/// Result of one [`StreamAligner::feed`] call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedOutcome {
    /// The marker was found during this call.
    pub newly_aligned: bool,
    /// Complete records, in stream order.
    pub records: Vec<Record>,
}

pub struct StreamAligner {
    layout: RecordLayout,
    marker: Vec<u8>,
    // KMP failure table for `marker`.
    failure: Vec<usize>,
    buffer: Vec<u8>,
    state: AlignState,
    best_match: usize,
    buffer_cap: usize,
}

impl StreamAligner {
    pub fn new(marker: impl Into<Vec<u8>>, layout: RecordLayout) -> Result<Self, LayoutError> {
        let marker = marker.into();
        if marker.is_empty() {
            return Err(LayoutError::EmptyMarker);
        }
        let failure = failure_table(&marker);
        let buffer_cap = DEFAULT_BUFFER_CAP.max(marker.len());
        Ok(Self {
            layout,
            marker,
            failure,
            buffer: Vec::new(),
            state: AlignState::Unaligned,
            best_match: 0,
            buffer_cap,
        })
    }

    /// Aligner for the LiDAR hub: [`LIDAR_MARKER`] + [`RecordLayout::lidar`].
    pub fn lidar() -> Self {
        Self {
            layout: RecordLayout::lidar(),
            failure: failure_table(&LIDAR_MARKER),
            marker: LIDAR_MARKER.to_vec(),
            buffer: Vec::new(),
            state: AlignState::Unaligned,
            best_match: 0,
            buffer_cap: DEFAULT_BUFFER_CAP,
        }
    }

    /// Bound the search buffer. Never smaller than the marker.
    pub fn with_buffer_cap(mut self, cap: usize) -> Self {
        self.buffer_cap = cap.max(self.marker.len());
        self
    }

    pub fn state(&self) -> AlignState {
        self.state
    }

    pub fn is_aligned(&self) -> bool {
        self.state == AlignState::Aligned
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Bytes currently held (a partial marker search or a partial record).
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Longest partial marker run seen since the last reset.
    pub fn best_match(&self) -> usize {
        self.best_match
    }

    /// Drop buffered bytes and search for the marker again.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = AlignState::Unaligned;
        self.best_match = 0;
    }

    /// Append `chunk` and return whatever became decodable.
    pub fn feed(&mut self, chunk: &[u8]) -> FeedOutcome {
        let mut outcome = FeedOutcome::default();
        self.buffer.extend_from_slice(chunk);

        if self.state == AlignState::Unaligned {
            match self.find_marker() {
                Some(end) => {
                    self.buffer.drain(..end);
                    self.state = AlignState::Aligned;
                    outcome.newly_aligned = true;
                    debug!(discarded = end, "alignment marker found");
                }
                None => {
                    self.trim();
                    return outcome;
                }
            }
        }

        let width = self.layout.width();
        let whole = self.buffer.len() / width * width;
        for chunk in self.buffer[..whole].chunks_exact(width) {
            match self.layout.decode(chunk) {
                Ok(record) => outcome.records.push(record),
                Err(e) => warn!(error = %e, "undecodable record skipped"),
            }
        }
        self.buffer.drain(..whole);
        outcome
    }

    /// Index one past the end of the first complete marker run.
    fn find_marker(&mut self) -> Option<usize> {
        let mut run = 0;
        for (i, &byte) in self.buffer.iter().enumerate() {
            while run > 0 && byte != self.marker[run] {
                self.best_match = self.best_match.max(run);
                run = self.failure[run - 1];
            }
            if byte == self.marker[run] {
                run += 1;
            }
            if run == self.marker.len() {
                self.best_match = run;
                return Some(i + 1);
            }
        }
        self.best_match = self.best_match.max(run);
        None
    }

    fn trim(&mut self) {
        if self.buffer.len() <= self.buffer_cap {
            return;
        }
        // Keep a possible marker prefix at the tail.
        let keep = self.marker.len() - 1;
        let dropped = self.buffer.len() - keep;
        self.buffer.drain(..dropped);
        trace!(dropped, best_match = self.best_match, "still searching for alignment marker");
    }
}

fn failure_table(marker: &[u8]) -> Vec<usize> {
    let mut table = vec![0; marker.len()];
    let mut k = 0;
    for i in 1..marker.len() {
        while k > 0 && marker[i] != marker[k] {
            k = table[k - 1];
        }
        if marker[i] == marker[k] {
            k += 1;
        }
        table[i] = k;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LidarSample;

    fn sample_bytes(distance: f32, rotation: f32) -> Vec<u8> {
        let mut out = distance.to_be_bytes().to_vec();
        out.extend_from_slice(&rotation.to_be_bytes());
        out
    }

    fn samples(outcome: &FeedOutcome) -> Vec<LidarSample> {
        outcome
            .records
            .iter()
            .map(|r| LidarSample::try_from(r).unwrap())
            .collect()
    }

    #[test]
    fn starts_unaligned_and_waits_for_marker() {
        let mut aligner = StreamAligner::lidar();
        let outcome = aligner.feed(&[0x00, 0x52, 0x53]);
        assert!(!outcome.newly_aligned);
        assert!(outcome.records.is_empty());
        assert_eq!(aligner.state(), AlignState::Unaligned);
        assert_eq!(aligner.best_match(), 2);
    }

    #[test]
    fn marker_split_across_chunks_aligns() {
        let mut stream = vec![0xAA, 0x01, 0x52];
        stream.extend_from_slice(&LIDAR_MARKER);
        for split in 1..stream.len() {
            let mut aligner = StreamAligner::lidar();
            let first = aligner.feed(&stream[..split]);
            let second = aligner.feed(&stream[split..]);
            assert!(first.newly_aligned || second.newly_aligned, "split at {split}");
            assert!(aligner.is_aligned());
            assert_eq!(aligner.buffered(), 0, "everything up to the marker is discarded");
        }
    }

    #[test]
    fn marker_split_across_many_chunks_aligns() {
        let mut aligner = StreamAligner::lidar();
        let mut aligned = false;
        for byte in [0x10, 0x20].iter().chain(LIDAR_MARKER.iter()) {
            aligned |= aligner.feed(&[*byte]).newly_aligned;
        }
        assert!(aligned);
        assert_eq!(aligner.buffered(), 0);
    }

    #[test]
    fn aligned_stream_yields_records_in_order() {
        let mut aligner = StreamAligner::lidar();
        aligner.feed(&LIDAR_MARKER);

        let mut data = sample_bytes(100.0, 0.5);
        data.extend_from_slice(&sample_bytes(42.25, 359.0));
        let outcome = aligner.feed(&data);

        assert_eq!(
            samples(&outcome),
            vec![
                LidarSample { distance: 100.0, rotation: 0.5 },
                LidarSample { distance: 42.25, rotation: 359.0 },
            ]
        );
        assert_eq!(aligner.buffered(), 0);
    }

    #[test]
    fn records_following_marker_in_same_chunk_are_decoded() {
        let mut chunk = vec![0xFF];
        chunk.extend_from_slice(&LIDAR_MARKER);
        chunk.extend_from_slice(&sample_bytes(1.0, 2.0));
        let outcome = StreamAligner::lidar().feed(&chunk);
        assert!(outcome.newly_aligned);
        assert_eq!(samples(&outcome), vec![LidarSample { distance: 1.0, rotation: 2.0 }]);
    }

    #[test]
    fn partial_record_waits_for_more_bytes() {
        let mut aligner = StreamAligner::lidar();
        aligner.feed(&LIDAR_MARKER);
        let bytes = sample_bytes(7.0, 8.0);
        assert!(aligner.feed(&bytes[..5]).records.is_empty());
        assert_eq!(aligner.buffered(), 5);
        assert_eq!(
            samples(&aligner.feed(&bytes[5..])),
            vec![LidarSample { distance: 7.0, rotation: 8.0 }]
        );
    }

    #[test]
    fn marker_inside_aligned_data_is_not_reinterpreted() {
        let mut aligner = StreamAligner::lidar();
        aligner.feed(&LIDAR_MARKER);
        let outcome = aligner.feed(&LIDAR_MARKER);
        assert!(!outcome.newly_aligned);
        assert_eq!(outcome.records.len(), 1);
        let expected = RecordLayout::lidar().decode(&LIDAR_MARKER).unwrap();
        assert_eq!(outcome.records[0], expected);
    }

    #[test]
    fn reset_searches_again() {
        let mut aligner = StreamAligner::lidar();
        aligner.feed(&LIDAR_MARKER);
        aligner.feed(&[1, 2, 3]);
        aligner.reset();
        assert_eq!(aligner.state(), AlignState::Unaligned);
        assert_eq!(aligner.buffered(), 0);
        assert!(aligner.feed(&sample_bytes(1.0, 1.0)).records.is_empty());
        assert!(aligner.feed(&LIDAR_MARKER).newly_aligned);
    }

    #[test]
    fn overlapping_partial_match_is_recovered() {
        let layout = RecordLayout::lidar();
        let mut aligner = StreamAligner::new(vec![0xAA, 0xAA, 0xBB], layout).unwrap();
        // A naive restart would miss the marker that begins at the second 0xAA.
        let outcome = aligner.feed(&[0xAA, 0xAA, 0xAA, 0xBB]);
        assert!(outcome.newly_aligned);
        assert_eq!(aligner.buffered(), 0);
    }

    #[test]
    fn search_buffer_is_bounded() {
        let mut aligner = StreamAligner::lidar().with_buffer_cap(16);
        aligner.feed(&[0u8; 64]);
        assert!(aligner.buffered() <= 16);
        // A marker prefix at the tail survives the trim.
        let mut chunk = vec![0u8; 10];
        chunk.extend_from_slice(&LIDAR_MARKER[..3]);
        aligner.feed(&chunk);
        assert!(aligner.buffered() <= 16);
        assert!(aligner.feed(&LIDAR_MARKER[3..]).newly_aligned);
    }

    #[test]
    fn empty_marker_is_rejected() {
        assert_eq!(
            StreamAligner::new(Vec::new(), RecordLayout::lidar()).err(),
            Some(LayoutError::EmptyMarker)
        );
    }
}
