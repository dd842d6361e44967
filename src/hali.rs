//! HALI: hierarchical adaptive learned index.
//!
//! Three tiers compose the index:
//!
//! 1. A range router: a sorted boundary array searched by `upper_bound`,
//!    guaranteeing exactly one candidate partition per key. Routing is a
//!    boundary search, never a prediction.
//! 2. Heterogeneous experts: each key-range partition is served by a PLS,
//!    RLM, or OT index, chosen at build time from the partition's
//!    linearity statistic and the compression level.
//! 3. A delta buffer absorbing every post-build insert, consulted before
//!    the static tier on every read.
//!
//! Bloom filters (one global, one per partition) short-circuit negative
//! lookups before any expert is touched.

use tracing::debug;

use crate::bloom::BloomFilter;
use crate::config::HaliConfig;
use crate::delta::DeltaBuffer;
use crate::error::IndexError;
use crate::index::{sorted_pairs, OrderedIndex};
use crate::ot::OtIndex;
use crate::pls::PlsIndex;
use crate::rlm::{linearity, RlmIndex};

/// Partitions below this size always get the exact ordered expert; there
/// is too little data to amortize a learned model.
const MIN_LEARNABLE_KEYS: usize = 100;

/// Expert family chosen for a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpertKind {
    Pls,
    Rlm,
    Ot,
}

enum Expert<V: Copy> {
    Pls(PlsIndex<V>),
    Rlm(RlmIndex<V>),
    Ot(OtIndex<V>),
}

impl<V: Copy> Expert<V> {
    fn find(&self, key: u64) -> Option<V> {
        match self {
            Self::Pls(index) => index.find(key),
            Self::Rlm(index) => index.find(key),
            Self::Ot(index) => index.find(key),
        }
    }

    fn kind(&self) -> ExpertKind {
        match self {
            Self::Pls(_) => ExpertKind::Pls,
            Self::Rlm(_) => ExpertKind::Rlm,
            Self::Ot(_) => ExpertKind::Ot,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Pls(index) => index.len(),
            Self::Rlm(index) => index.len(),
            Self::Ot(index) => index.len(),
        }
    }

    fn memory_bytes(&self) -> usize {
        match self {
            Self::Pls(index) => index.memory_bytes(),
            Self::Rlm(index) => index.memory_bytes(),
            Self::Ot(index) => index.memory_bytes(),
        }
    }
}

/// One key-range partition: its expert, its Bloom filter, and the span of
/// keys actually stored (`None` for a partition that received no keys).
struct Partition<V: Copy> {
    expert: Expert<V>,
    bloom: BloomFilter,
    stored_range: Option<(u64, u64)>,
}

/// Aggregate diagnostic snapshot.
#[derive(Debug, Clone)]
pub struct HaliStats {
    pub n_static: usize,
    pub delta_len: usize,
    pub partitions: usize,
    pub pls_partitions: usize,
    pub rlm_partitions: usize,
    pub ot_partitions: usize,
    pub empty_partitions: usize,
    pub memory_bytes: usize,
}

/// The composed index. See the module docs for the tier layout.
///
/// Built once over the full key set, then immutable apart from the delta
/// buffer. Strictly single-threaded: every operation takes the index by
/// reference with exclusive access semantics.
pub struct HaliIndex<V: Copy> {
    config: HaliConfig,
    /// `m + 1` entries: partition lower bounds plus a sentinel strictly
    /// above every stored key (saturated at `u64::MAX` when the key space
    /// tops out).
    boundaries: Vec<u64>,
    partitions: Vec<Partition<V>>,
    global_bloom: BloomFilter,
    delta: DeltaBuffer<V>,
    n_static: usize,
    saturated_sentinel: bool,
}

impl<V: Copy> HaliIndex<V> {
    /// Balanced configuration (compression level 0.5).
    pub fn new() -> Self {
        Self::with_config(HaliConfig::default())
    }

    /// Configure the speed/memory bias; the level is clamped into
    /// `[0, 1]`.
    pub fn with_compression(compression_level: f64) -> Self {
        Self::with_config(HaliConfig::new(compression_level))
    }

    pub fn with_config(config: HaliConfig) -> Self {
        Self {
            config,
            boundaries: Vec::new(),
            partitions: Vec::new(),
            global_bloom: BloomFilter::new(1, config.bloom_bits_per_key()),
            delta: DeltaBuffer::for_compression(config.compression_level),
            n_static: 0,
            saturated_sentinel: false,
        }
    }

    pub fn compression_level(&self) -> f64 {
        self.config.compression_level
    }

    /// Router boundary array, including the trailing sentinel. Strictly
    /// increasing; exposed for white-box validation.
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// `true` when the sentinel had to saturate at `u64::MAX` because the
    /// build contained the maximum representable key.
    pub fn saturated_sentinel(&self) -> bool {
        self.saturated_sentinel
    }

    /// Per-partition expert kinds, in router order.
    pub fn expert_kinds(&self) -> Vec<ExpertKind> {
        self.partitions.iter().map(|p| p.expert.kind()).collect()
    }

    /// Per-partition key counts, in router order.
    pub fn partition_lens(&self) -> Vec<usize> {
        self.partitions.iter().map(|p| p.expert.len()).collect()
    }

    /// Min and max key actually stored in partition `i`, or `None` for an
    /// empty partition (or out-of-range `i`).
    pub fn partition_key_range(&self, i: usize) -> Option<(u64, u64)> {
        self.partitions.get(i).and_then(|p| p.stored_range)
    }

    pub fn global_bloom(&self) -> &BloomFilter {
        &self.global_bloom
    }

    pub fn partition_bloom(&self, i: usize) -> Option<&BloomFilter> {
        self.partitions.get(i).map(|p| &p.bloom)
    }

    /// Partition index the router resolves `key` to, or `None` when the
    /// static tier is empty.
    pub fn route(&self, key: u64) -> Option<usize> {
        if self.partitions.is_empty() {
            return None;
        }
        Some(route_to_partition(self.router_bounds(), key))
    }

    pub fn stats(&self) -> HaliStats {
        let mut pls = 0;
        let mut rlm = 0;
        let mut ot = 0;
        let mut empty = 0;
        for partition in &self.partitions {
            match partition.expert.kind() {
                ExpertKind::Pls => pls += 1,
                ExpertKind::Rlm => rlm += 1,
                ExpertKind::Ot => ot += 1,
            }
            if partition.stored_range.is_none() {
                empty += 1;
            }
        }

        HaliStats {
            n_static: self.n_static,
            delta_len: self.delta.len(),
            partitions: self.partitions.len(),
            pls_partitions: pls,
            rlm_partitions: rlm,
            ot_partitions: ot,
            empty_partitions: empty,
            memory_bytes: self.memory_bytes(),
        }
    }

    /// The boundary slots the router actually searches: everything except
    /// the sentinel.
    fn router_bounds(&self) -> &[u64] {
        &self.boundaries[..self.boundaries.len() - 1]
    }

    fn find_static(&self, key: u64) -> Option<V> {
        if self.partitions.is_empty() {
            return None;
        }
        if !self.global_bloom.contains(key) {
            return None;
        }

        let j = route_to_partition(self.router_bounds(), key);
        let partition = &self.partitions[j];

        if !partition.bloom.contains(key) {
            // A sound Bloom filter cannot give a false negative, so a miss
            // outside the stored span is a definite absence. Inside the
            // span we fall through to the expert as a guard against a
            // mis-sized or stale filter.
            match partition.stored_range {
                Some((lo, hi)) if key >= lo && key <= hi => {}
                _ => return None,
            }
        }

        partition.expert.find(key)
    }
}

impl<V: Copy> Default for HaliIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Copy> OrderedIndex<V> for HaliIndex<V> {
    fn build(&mut self, keys: &[u64], values: &[V]) -> Result<(), IndexError> {
        self.clear();
        let pairs = sorted_pairs(keys, values)?;
        if pairs.is_empty() {
            return Ok(());
        }

        let n = pairs.len();
        let k_min = pairs[0].0;
        let k_max = pairs[n - 1].0;
        let m = if k_min == k_max {
            1
        } else {
            self.config.expert_count(n)
        };

        // Partition lower bounds, computed in 128-bit arithmetic so the
        // key-range span cannot overflow. Unique keys give span >= n >= m,
        // which keeps consecutive bounds strictly increasing.
        let span = k_max as u128 - k_min as u128 + 1;
        let mut boundaries = Vec::with_capacity(m + 1);
        for i in 0..m {
            boundaries.push(k_min + (i as u128 * span / m as u128) as u64);
        }
        let (sentinel, saturated) = match k_max.checked_add(1) {
            Some(s) => (s, false),
            None => (u64::MAX, true),
        };
        boundaries.push(sentinel);

        // Distribute keys with the same boundary search the read path
        // uses, so partition contents and routing can never disagree.
        let mut partition_pairs: Vec<Vec<(u64, V)>> = (0..m).map(|_| Vec::new()).collect();
        for &(key, value) in &pairs {
            let j = route_to_partition(&boundaries[..m], key);
            partition_pairs[j].push((key, value));
        }

        let bits_per_key = self.config.bloom_bits_per_key();
        let mut global_bloom = BloomFilter::new(n, bits_per_key);
        for &(key, _) in &pairs {
            global_bloom.insert(key);
        }

        let mut partitions = Vec::with_capacity(m);
        for part in partition_pairs {
            if part.is_empty() {
                // Gap in clustered data: an empty exact expert keeps the
                // partition ids aligned with the boundary array.
                partitions.push(Partition {
                    expert: Expert::Ot(OtIndex::new()),
                    bloom: BloomFilter::new(1, bits_per_key),
                    stored_range: None,
                });
                continue;
            }

            let (part_keys, part_values): (Vec<u64>, Vec<V>) = part.into_iter().unzip();
            let stored_range = Some((part_keys[0], *part_keys.last().unwrap()));

            let mut bloom = BloomFilter::new(part_keys.len(), bits_per_key);
            for &key in &part_keys {
                bloom.insert(key);
            }

            let kind = select_expert_kind(&part_keys, self.config.compression_level);
            let expert = match kind {
                ExpertKind::Pls => {
                    let mut index = PlsIndex::new();
                    index.load_sorted(part_keys, part_values);
                    Expert::Pls(index)
                }
                ExpertKind::Rlm => {
                    let mut index = RlmIndex::with_leaf_count(1);
                    index.load_sorted(part_keys, part_values);
                    Expert::Rlm(index)
                }
                ExpertKind::Ot => {
                    let mut index = OtIndex::new();
                    index.load_sorted(part_keys, part_values);
                    Expert::Ot(index)
                }
            };

            partitions.push(Partition {
                expert,
                bloom,
                stored_range,
            });
        }

        self.boundaries = boundaries;
        self.partitions = partitions;
        self.global_bloom = global_bloom;
        self.n_static = n;
        self.saturated_sentinel = saturated;

        let stats = self.stats();
        debug!(
            n,
            partitions = m,
            pls = stats.pls_partitions,
            rlm = stats.rlm_partitions,
            ot = stats.ot_partitions,
            empty = stats.empty_partitions,
            bits_per_key,
            compression = self.config.compression_level,
            "built hali index"
        );

        Ok(())
    }

    fn find(&self, key: u64) -> Option<V> {
        // Delta precedence is total: anything inserted after build wins.
        if let Some(value) = self.delta.find(key) {
            return Some(value);
        }
        self.find_static(key)
    }

    fn insert(&mut self, key: u64, value: V) -> bool {
        if self.find(key).is_some() {
            return false;
        }
        self.delta.insert(key, value)
    }

    fn erase(&mut self, key: u64) -> bool {
        // Only the delta buffer is erasable; the static tier is frozen.
        self.delta.erase(key)
    }

    fn len(&self) -> usize {
        self.n_static + self.delta.len()
    }

    fn memory_bytes(&self) -> usize {
        let mut total = self.global_bloom.memory_bytes();
        for partition in &self.partitions {
            total += partition.expert.memory_bytes() + partition.bloom.memory_bytes();
        }
        total += self.boundaries.capacity() * std::mem::size_of::<u64>();
        total += self.delta.memory_bytes();
        total
    }

    fn name(&self) -> String {
        format!("HALI(c={:.2})", self.config.compression_level)
    }

    fn clear(&mut self) {
        self.boundaries.clear();
        self.partitions.clear();
        self.global_bloom = BloomFilter::new(1, self.config.bloom_bits_per_key());
        self.delta = DeltaBuffer::for_compression(self.config.compression_level);
        self.n_static = 0;
        self.saturated_sentinel = false;
    }
}

/// Largest `i` with `lower_bounds[i] <= key`, clamped to 0 for keys below
/// the first bound. `lower_bounds` excludes the sentinel, so the result is
/// always a valid partition id.
#[inline]
fn route_to_partition(lower_bounds: &[u64], key: u64) -> usize {
    lower_bounds
        .partition_point(|&bound| bound <= key)
        .saturating_sub(1)
}

/// Adaptive expert-kind selection over a partition's sorted keys.
///
/// Small partitions always take the exact expert; otherwise the linearity
/// statistic is gated by thresholds that shift with the compression level:
/// low levels favor fast exact structures, high levels favor compact
/// learned segments.
fn select_expert_kind(keys: &[u64], compression_level: f64) -> ExpertKind {
    if keys.len() < MIN_LEARNABLE_KEYS {
        return ExpertKind::Ot;
    }

    let r2 = linearity(keys);

    if compression_level < 0.3 {
        if r2 > 0.90 {
            ExpertKind::Rlm
        } else {
            ExpertKind::Ot
        }
    } else if compression_level > 0.7 {
        if r2 > 0.70 {
            ExpertKind::Pls
        } else {
            ExpertKind::Rlm
        }
    } else if r2 > 0.95 {
        ExpertKind::Pls
    } else if r2 > 0.80 {
        ExpertKind::Rlm
    } else {
        ExpertKind::Ot
    }
}
