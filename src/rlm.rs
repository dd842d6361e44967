//! RLM: two-layer recursive linear model with bounded-window correction.
//!
//! Layer 1 is a single least-squares regressor routing a key to one of `L`
//! leaf models; layer 2's leaf regressors map the key to a position in the
//! sorted key array. Predictions are corrected by binary search inside a
//! window sized from the worst error actually observed at training time
//! (never narrower than [`RLM_EPSILON`]), so a key present in the static
//! tier is always found.

use crate::error::IndexError;
use crate::index::{sorted_pairs, OrderedIndex};
use crate::search::bounded_search;

/// Minimum half-width of the correction window.
pub const RLM_EPSILON: usize = 64;

/// Leaf model count for the standalone baseline configuration.
pub const DEFAULT_LEAF_MODELS: usize = 100;

/// Denominator threshold below which a least-squares fit is degenerate.
const EPS_NUM: f64 = 1e-10;

/// Single linear regressor fit by ordinary least squares.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LinearModel {
    slope: f64,
    intercept: f64,
}

impl LinearModel {
    /// Fit `target = slope * key + intercept` over `(key, target)` points.
    /// A degenerate denominator (all keys equal, or no points) falls back
    /// to a flat line through the mean target.
    pub(crate) fn fit(points: impl Iterator<Item = (f64, f64)>) -> Self {
        let mut n = 0.0f64;
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        let mut sum_xy = 0.0f64;
        let mut sum_x2 = 0.0f64;

        for (x, y) in points {
            n += 1.0;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_x2 += x * x;
        }

        if n == 0.0 {
            return Self::default();
        }

        let mean_x = sum_x / n;
        let mean_y = sum_y / n;
        let numerator = sum_xy - n * mean_x * mean_y;
        let denominator = sum_x2 - n * mean_x * mean_x;

        if denominator.abs() > EPS_NUM {
            let slope = numerator / denominator;
            Self {
                slope,
                intercept: mean_y - slope * mean_x,
            }
        } else {
            Self {
                slope: 0.0,
                intercept: mean_y,
            }
        }
    }

    /// Evaluate the model and clamp into `[0, max]`.
    #[inline]
    pub(crate) fn predict(&self, key: u64, max: usize) -> usize {
        let predicted = self.slope * key as f64 + self.intercept;
        (predicted.max(0.0) as usize).min(max)
    }
}

/// Coefficient of determination (r²) of position index against key value
/// over a sorted key sequence.
///
/// This is the linearity statistic HALI's expert selection gates on: values
/// near 1.0 mean a linear model will predict positions tightly.
pub fn linearity(keys: &[u64]) -> f64 {
    let n = keys.len();
    if n < 2 {
        return 1.0;
    }

    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    let mut sum_xy = 0.0f64;
    let mut sum_x2 = 0.0f64;
    let mut sum_y2 = 0.0f64;

    for (i, &key) in keys.iter().enumerate() {
        let x = key as f64;
        let y = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
        sum_y2 += y * y;
    }

    let n = n as f64;
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;
    let numerator = sum_xy - n * mean_x * mean_y;
    let den_x = sum_x2 - n * mean_x * mean_x;
    let den_y = sum_y2 - n * mean_y * mean_y;

    if den_x < EPS_NUM || den_y < EPS_NUM {
        return 0.0;
    }

    let r = numerator / (den_x * den_y).sqrt();
    r * r
}

/// Two-layer recursive linear model index.
///
/// As a HALI expert it runs with one leaf model; standalone it defaults to
/// [`DEFAULT_LEAF_MODELS`]. The static tier is immutable after `build`;
/// later inserts land in a scan buffer.
pub struct RlmIndex<V: Copy> {
    root: LinearModel,
    leaves: Vec<LinearModel>,
    /// Per-leaf correction half-width: worst training error, floored at
    /// [`RLM_EPSILON`].
    leaf_windows: Vec<usize>,
    leaf_count: usize,
    keys: Vec<u64>,
    values: Vec<V>,
    buffer: Vec<(u64, V)>,
}

impl<V: Copy> RlmIndex<V> {
    /// Standalone baseline configuration.
    pub fn new() -> Self {
        Self::with_leaf_count(DEFAULT_LEAF_MODELS)
    }

    /// Configure the layer-2 width. HALI builds its RLM experts with a
    /// single leaf.
    pub fn with_leaf_count(leaf_count: usize) -> Self {
        Self {
            root: LinearModel::default(),
            leaves: Vec::new(),
            leaf_windows: Vec::new(),
            leaf_count: leaf_count.max(1),
            keys: Vec::new(),
            values: Vec::new(),
            buffer: Vec::new(),
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Load from already-sorted, duplicate-free keys.
    pub(crate) fn load_sorted(&mut self, keys: Vec<u64>, values: Vec<V>) {
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        self.keys = keys;
        self.values = values;
        self.buffer.clear();
        self.train();
    }

    fn train(&mut self) {
        let p = self.keys.len();
        self.leaves = vec![LinearModel::default(); self.leaf_count];
        self.leaf_windows = vec![RLM_EPSILON; self.leaf_count];
        if p == 0 {
            self.root = LinearModel::default();
            return;
        }

        // Layer 1: key -> evenly spaced leaf index.
        let leaf_count = self.leaf_count;
        self.root = LinearModel::fit(
            self.keys
                .iter()
                .enumerate()
                .map(|(i, &k)| (k as f64, (i * leaf_count / p) as f64)),
        );

        // Layer 2: group keys by the leaf the trained root actually routes
        // them to, then fit each leaf on its keys' true positions. Routing
        // is deterministic, so lookups replay the same assignment.
        let mut assigned: Vec<Vec<(f64, f64)>> = vec![Vec::new(); leaf_count];
        for (i, &key) in self.keys.iter().enumerate() {
            let leaf = self.root.predict(key, leaf_count - 1);
            assigned[leaf].push((key as f64, i as f64));
        }

        for (leaf, points) in assigned.iter().enumerate() {
            if !points.is_empty() {
                self.leaves[leaf] = LinearModel::fit(points.iter().copied());
            }
        }

        // Widen each leaf's window to the worst error it produced in
        // training, so bounded search cannot miss a stored key.
        let max_pos = p - 1;
        for (i, &key) in self.keys.iter().enumerate() {
            let leaf = self.root.predict(key, leaf_count - 1);
            let predicted = self.leaves[leaf].predict(key, max_pos);
            let error = predicted.abs_diff(i);
            if error > self.leaf_windows[leaf] {
                self.leaf_windows[leaf] = error;
            }
        }
    }

    fn find_static(&self, key: u64) -> Option<V> {
        if self.keys.is_empty() {
            return None;
        }

        let leaf = self.root.predict(key, self.leaf_count - 1);
        let predicted = self.leaves[leaf].predict(key, self.keys.len() - 1);
        bounded_search(&self.keys, key, predicted, self.leaf_windows[leaf])
            .map(|i| self.values[i])
    }
}

impl<V: Copy> Default for RlmIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Copy> OrderedIndex<V> for RlmIndex<V> {
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
            + (1 + self.leaves.capacity()) * std::mem::size_of::<LinearModel>()
            + self.leaf_windows.capacity() * std::mem::size_of::<usize>()
            + self.buffer.capacity() * std::mem::size_of::<(u64, V)>()
    }

    fn name(&self) -> String {
        "RLM".to_string()
    }

    fn clear(&mut self) {
        self.root = LinearModel::default();
        self.leaves.clear();
        self.leaf_windows.clear();
        self.keys.clear();
        self.values.clear();
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_fit_recovers_line() {
        let model = LinearModel::fit((0..100u64).map(|i| (i as f64, (i * 3 + 5) as f64)));
        assert!((model.slope - 3.0).abs() < 1e-6);
        assert!((model.intercept - 5.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_fit_falls_back_to_mean() {
        let model = LinearModel::fit([(7.0, 10.0), (7.0, 20.0), (7.0, 30.0)].into_iter());
        assert_eq!(model.slope, 0.0);
        assert!((model.intercept - 20.0).abs() < 1e-9);
    }

    #[test]
    fn linearity_of_sequential_keys_is_one() {
        let keys: Vec<u64> = (0..1000).collect();
        assert!(linearity(&keys) > 0.999);
    }

    #[test]
    fn linearity_of_clustered_keys_is_low() {
        // Two dense clusters with a huge gap: position is far from linear
        // in key value.
        let mut keys: Vec<u64> = (0..500).collect();
        keys.extend(1_000_000_000..1_000_000_500u64);
        assert!(linearity(&keys) < 0.80);
    }

    #[test]
    fn linearity_degenerate_cases() {
        assert_eq!(linearity(&[]), 1.0);
        assert_eq!(linearity(&[42]), 1.0);
    }

    #[test]
    fn finds_all_keys_on_linear_data() {
        let keys: Vec<u64> = (0..10_000).map(|i| i * 5).collect();
        let values: Vec<u64> = keys.iter().map(|k| k + 1).collect();
        let mut index = RlmIndex::new();
        index.build(&keys, &values).unwrap();

        for &k in &keys {
            assert_eq!(index.find(k), Some(k + 1));
        }
        assert_eq!(index.find(3), None);
        assert_eq!(index.find(50_001), None);
    }

    #[test]
    fn single_leaf_expert_configuration() {
        let keys: Vec<u64> = (0..2_000).map(|i| i * 7 + 3).collect();
        let values: Vec<u64> = keys.clone();
        let mut index = RlmIndex::with_leaf_count(1);
        index.build(&keys, &values).unwrap();

        assert_eq!(index.leaf_count(), 1);
        for &k in &keys {
            assert_eq!(index.find(k), Some(k));
        }
    }

    #[test]
    fn widened_window_covers_nonlinear_data() {
        // Exponential-ish gaps give the linear model large errors; the
        // observed-error window must still find every key.
        let keys: Vec<u64> = (0..2_000u64).map(|i| i * i * 13 + i).collect();
        let values: Vec<u64> = keys.clone();
        let mut index = RlmIndex::with_leaf_count(1);
        index.build(&keys, &values).unwrap();

        for &k in &keys {
            assert_eq!(index.find(k), Some(k), "key {} missed", k);
        }
    }

    #[test]
    fn insert_erase_buffer_semantics() {
        let mut index: RlmIndex<u64> = RlmIndex::new();
        index.build(&[10, 20, 30], &[1, 2, 3]).unwrap();

        assert!(index.insert(15, 150));
        assert!(!index.insert(15, 151));
        assert!(!index.insert(20, 999));
        assert_eq!(index.find(15), Some(150));
        assert_eq!(index.len(), 4);

        assert!(index.erase(15));
        assert!(!index.erase(20));
        assert_eq!(index.find(15), None);
        assert_eq!(index.find(20), Some(2));
    }
}
