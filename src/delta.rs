//! Delta buffer: write absorption after the static tier is frozen.
//!
//! Every post-build insert lands here, and reads consult it before
//! anything else, so the static tier never needs mutation. The backing
//! container is picked once at build time from the compression level: a
//! hash map when the bias is speed, an ordered map when the bias is memory
//! (and an eventual ordered merge into the static tier).

use std::collections::BTreeMap;

use ahash::AHashMap;

/// Post-build write buffer with total read precedence.
pub enum DeltaBuffer<V: Copy> {
    /// Fast point operations; compression level below 0.5.
    Hashed(AHashMap<u64, V>),
    /// Ordered variant kept merge-ready; compression level 0.5 and up.
    Ordered(BTreeMap<u64, V>),
}

impl<V: Copy> DeltaBuffer<V> {
    /// Pick the variant for a compression level.
    pub fn for_compression(compression_level: f64) -> Self {
        if compression_level < 0.5 {
            Self::Hashed(AHashMap::new())
        } else {
            Self::Ordered(BTreeMap::new())
        }
    }

    /// Insert a pair. Returns `true` iff the key was absent; an existing
    /// entry is left untouched.
    pub fn insert(&mut self, key: u64, value: V) -> bool {
        match self {
            Self::Hashed(map) => {
                if map.contains_key(&key) {
                    return false;
                }
                map.insert(key, value);
                true
            }
            Self::Ordered(map) => {
                if map.contains_key(&key) {
                    return false;
                }
                map.insert(key, value);
                true
            }
        }
    }

    pub fn find(&self, key: u64) -> Option<V> {
        match self {
            Self::Hashed(map) => map.get(&key).copied(),
            Self::Ordered(map) => map.get(&key).copied(),
        }
    }

    pub fn erase(&mut self, key: u64) -> bool {
        match self {
            Self::Hashed(map) => map.remove(&key).is_some(),
            Self::Ordered(map) => map.remove(&key).is_some(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Hashed(map) => map.len(),
            Self::Ordered(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match self {
            Self::Hashed(map) => map.clear(),
            Self::Ordered(map) => map.clear(),
        }
    }

    /// Estimated resident bytes: entry payload plus container overhead
    /// (~30% for the hash table, ~25% for the ordered map).
    pub fn memory_bytes(&self) -> usize {
        let entry = std::mem::size_of::<u64>() + std::mem::size_of::<V>();
        match self {
            Self::Hashed(map) => map.len() * entry + map.len() * entry * 3 / 10,
            Self::Ordered(map) => map.len() * entry + map.len() * entry / 4,
        }
    }
}
