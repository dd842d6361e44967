//! Shared operation set for every index family in this crate.

use crate::error::IndexError;

/// Point-lookup index over unique `u64` keys with copyable values.
///
/// The composed HALI index and its three expert families (PLS, RLM, OT) all
/// speak this contract, so embedders can construct any of them, `build`
/// once, and interleave `find`/`insert`/`erase` without caring which
/// representation is underneath.
pub trait OrderedIndex<V: Copy> {
    /// Bulk-load the index from parallel key/value slices.
    ///
    /// Keys need not be sorted; duplicates are rejected with
    /// [`IndexError::DuplicateKey`]. Existing state is cleared first, so a
    /// failed build leaves the index empty rather than half-replaced.
    fn build(&mut self, keys: &[u64], values: &[V]) -> Result<(), IndexError>;

    /// Look up a key. Pure; no side effects.
    fn find(&self, key: u64) -> Option<V>;

    /// Insert a key/value pair. Returns `true` iff the key was not already
    /// present anywhere in the index. The first insert wins; a repeat
    /// insert changes nothing and returns `false`.
    fn insert(&mut self, key: u64, value: V) -> bool;

    /// Remove a key where the representation supports removal. Learned
    /// indexes only remove post-build inserts; keys frozen at build time
    /// stay put and `erase` reports `false` for them.
    fn erase(&mut self, key: u64) -> bool;

    /// Number of keys currently resolvable, built plus inserted.
    fn len(&self) -> usize;

    /// `true` iff `len() == 0`.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Estimated resident size in bytes, for memory/latency comparisons.
    fn memory_bytes(&self) -> usize;

    /// Human-readable identifier, e.g. `"HALI(c=0.50)"`.
    fn name(&self) -> String;

    /// Drop all state and return to the freshly-constructed empty index.
    fn clear(&mut self);
}

/// Sort `(key, value)` pairs by key and reject duplicate keys.
///
/// Every `build` implementation funnels through this so the error behavior
/// is identical across index families.
pub(crate) fn sorted_pairs<V: Copy>(
    keys: &[u64],
    values: &[V],
) -> Result<Vec<(u64, V)>, IndexError> {
    if keys.len() != values.len() {
        return Err(IndexError::InputLengthMismatch {
            keys: keys.len(),
            values: values.len(),
        });
    }

    let mut pairs: Vec<(u64, V)> = keys.iter().copied().zip(values.iter().copied()).collect();
    pairs.sort_unstable_by_key(|&(k, _)| k);

    for w in pairs.windows(2) {
        if w[0].0 == w[1].0 {
            return Err(IndexError::DuplicateKey { key: w[0].0 });
        }
    }

    Ok(pairs)
}
