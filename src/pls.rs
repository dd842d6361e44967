//! PLS: piecewise-linear segment index with a per-segment error bound.
//!
//! A single pass over the sorted keys grows each segment while a feasible
//! slope interval (the "cone") stays non-empty; the moment a key would push
//! every admissible line more than `PLS_EPSILON` positions off, the segment
//! is closed and a new one starts. Lookup binary-searches the segment
//! table, evaluates the covering line, and corrects the prediction inside a
//! `±PLS_EPSILON` window of the key array.

use crate::error::IndexError;
use crate::index::{sorted_pairs, OrderedIndex};
use crate::search::bounded_search;

/// Maximum deviation between a segment's prediction and the true position.
pub const PLS_EPSILON: usize = 64;

/// One linear segment covering a contiguous key span.
///
/// The line is anchored at the segment's first (key, position) pair and
/// evaluated on the key *delta*, keeping the arithmetic at position scale
/// even for keys near `u64::MAX`. The invariant
/// `|pos(k) - predict(k)| <= PLS_EPSILON` holds for every covered key.
#[derive(Debug, Clone, Copy)]
struct Segment {
    first_key: u64,
    first_pos: usize,
    slope: f64,
}

impl Segment {
    #[inline]
    fn predict(&self, key: u64, max_pos: usize) -> usize {
        let delta = if key >= self.first_key {
            (key - self.first_key) as f64
        } else {
            -((self.first_key - key) as f64)
        };
        let predicted = self.first_pos as f64 + self.slope * delta;
        (predicted.max(0.0) as usize).min(max_pos)
    }
}

/// Shrinking-cone sweep over strictly increasing keys.
///
/// For each candidate point the admissible slope interval through the
/// segment anchor is intersected with the cone that keeps the point within
/// `epsilon` positions; an empty intersection closes the segment.
fn build_segments(keys: &[u64], epsilon: usize) -> Vec<Segment> {
    let mut segments = Vec::new();
    if keys.is_empty() {
        return segments;
    }

    let eps = epsilon as f64;
    let mut anchor = 0usize;
    let mut slope_lo = f64::NEG_INFINITY;
    let mut slope_hi = f64::INFINITY;

    for i in anchor + 1..keys.len() {
        // Keys are strictly increasing, so dx > 0.
        let dx = (keys[i] - keys[anchor]) as f64;
        let dy = (i - anchor) as f64;

        let lo = slope_lo.max((dy - eps) / dx);
        let hi = slope_hi.min((dy + eps) / dx);

        if lo > hi {
            segments.push(close_segment(keys[anchor], anchor, slope_lo, slope_hi));
            anchor = i;
            slope_lo = f64::NEG_INFINITY;
            slope_hi = f64::INFINITY;
        } else {
            slope_lo = lo;
            slope_hi = hi;
        }
    }

    segments.push(close_segment(keys[anchor], anchor, slope_lo, slope_hi));
    segments
}

fn close_segment(first_key: u64, first_pos: usize, slope_lo: f64, slope_hi: f64) -> Segment {
    // A one-point segment never narrowed its cone: flat line through the
    // anchor's own position.
    let slope = if slope_lo.is_infinite() || slope_hi.is_infinite() {
        0.0
    } else {
        (slope_lo + slope_hi) / 2.0
    };

    Segment {
        first_key,
        first_pos,
        slope,
    }
}

/// Piecewise-linear segment index.
///
/// The static tier (keys, values, segment table) is immutable after
/// `build`; later inserts go to a small scan buffer, matching the
/// write-path behavior of the other learned expert.
pub struct PlsIndex<V: Copy> {
    keys: Vec<u64>,
    values: Vec<V>,
    segments: Vec<Segment>,
    buffer: Vec<(u64, V)>,
}

impl<V: Copy> PlsIndex<V> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            segments: Vec::new(),
            buffer: Vec::new(),
        }
    }

    /// Load from already-sorted, duplicate-free keys. Construction cannot
    /// fail on such input.
    pub(crate) fn load_sorted(&mut self, keys: Vec<u64>, values: Vec<V>) {
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        self.segments = build_segments(&keys, PLS_EPSILON);
        self.keys = keys;
        self.values = values;
        self.buffer.clear();
    }

    /// Number of linear segments covering the static tier.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn find_static(&self, key: u64) -> Option<V> {
        if self.keys.is_empty() {
            return None;
        }

        // Largest segment whose first key is <= key; keys below the first
        // segment clamp to segment 0 and miss in the corrected window.
        let seg_idx = self
            .segments
            .partition_point(|s| s.first_key <= key)
            .saturating_sub(1);
        let predicted = self.segments[seg_idx].predict(key, self.keys.len() - 1);

        bounded_search(&self.keys, key, predicted, PLS_EPSILON).map(|i| self.values[i])
    }
}

impl<V: Copy> Default for PlsIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Copy> OrderedIndex<V> for PlsIndex<V> {
    fn build(&mut self, keys: &[u64], values: &[V]) -> Result<(), IndexError> {
        self.clear();
        let pairs = sorted_pairs(keys, values)?;
        let (sorted_keys, sorted_values) = pairs.into_iter().unzip();
        self.load_sorted(sorted_keys, sorted_values);
        Ok(())
    }

    fn find(&self, key: u64) -> Option<V> {
        if let Some(v) = self.find_static(key) {
            return Some(v);
        }
        self.buffer
            .iter()
            .find(|&&(k, _)| k == key)
            .map(|&(_, v)| v)
    }

    fn insert(&mut self, key: u64, value: V) -> bool {
        if self.find(key).is_some() {
            return false;
        }
        self.buffer.push((key, value));
        true
    }

    fn erase(&mut self, key: u64) -> bool {
        match self.buffer.iter().position(|&(k, _)| k == key) {
            Some(i) => {
                self.buffer.remove(i);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.keys.len() + self.buffer.len()
    }

    fn memory_bytes(&self) -> usize {
        self.keys.capacity() * std::mem::size_of::<u64>()
            + self.values.capacity() * std::mem::size_of::<V>()
            + self.segments.capacity() * std::mem::size_of::<Segment>()
            + self.buffer.capacity() * std::mem::size_of::<(u64, V)>()
    }

    fn name(&self) -> String {
        "PLS".to_string()
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
        self.segments.clear();
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(keys: &[u64]) -> PlsIndex<u64> {
        let values: Vec<u64> = keys.iter().map(|k| k * 2).collect();
        let mut index = PlsIndex::new();
        index.build(keys, &values).unwrap();
        index
    }

    #[test]
    fn every_built_key_is_found() {
        let keys: Vec<u64> = (0..10_000).map(|i| i * 3 + 7).collect();
        let index = built(&keys);

        for &k in &keys {
            assert_eq!(index.find(k), Some(k * 2), "key {} missed", k);
        }
        assert_eq!(index.find(0), None);
        assert_eq!(index.find(keys.last().unwrap() + 1), None);
    }

    #[test]
    fn segment_error_bound_holds_on_irregular_data() {
        // Quadratic gaps force segment splits; correctness must survive.
        let keys: Vec<u64> = (0..5_000u64).map(|i| i * i).collect();
        let index = built(&keys);

        assert!(index.segment_count() > 1);
        for &k in &keys {
            assert_eq!(index.find(k), Some(k * 2));
        }
    }

    #[test]
    fn linear_data_needs_one_segment() {
        let keys: Vec<u64> = (100..1_100).collect();
        let index = built(&keys);
        assert_eq!(index.segment_count(), 1);
    }

    #[test]
    fn single_key() {
        let index = built(&[42]);
        assert_eq!(index.find(42), Some(84));
        assert_eq!(index.find(41), None);
        assert_eq!(index.segment_count(), 1);
    }

    #[test]
    fn insert_buffer_round_trip() {
        let mut index = built(&[10, 20, 30]);

        assert!(index.insert(25, 250));
        assert_eq!(index.find(25), Some(250));
        assert_eq!(index.len(), 4);

        // First insert wins, both against the buffer and the static tier.
        assert!(!index.insert(25, 999));
        assert!(!index.insert(10, 999));
        assert_eq!(index.find(25), Some(250));

        assert!(index.erase(25));
        assert_eq!(index.find(25), None);
        assert!(!index.erase(10), "static keys are frozen");
        assert_eq!(index.find(10), Some(20));
    }

    #[test]
    fn build_clears_previous_state() {
        let mut index = built(&[1, 2, 3]);
        index.insert(100, 1);
        index.build(&[50], &[500]).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.find(50), Some(500));
        assert_eq!(index.find(1), None);
        assert_eq!(index.find(100), None);
    }
}
