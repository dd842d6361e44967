//! Bloom filter: fixed-size membership sieve with double-hashed probes.
//!
//! A `false` from [`BloomFilter::contains`] means definitely absent; a
//! `true` means possibly present. HALI places one filter in front of the
//! whole static tier and one in front of each partition so negative lookups
//! rarely touch an expert.

use std::hash::Hasher;

use twox_hash::XxHash64;

/// Membership sieve over `u64` keys.
///
/// Sized as `expected_keys * bits_per_key` bits rounded up to a whole
/// 64-bit word, probed `k = max(1, round(bits_per_key * ln 2))` times via
/// double hashing: probe i is `(h1 + i*h2) mod num_bits`, with `h2`
/// obtained by rehashing the key seeded with `h1`.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    inserted: usize,
}

impl BloomFilter {
    /// Allocate a filter for `expected_keys` insertions at `bits_per_key`
    /// bits each. Both parameters are floored at 1 so a degenerate request
    /// still yields a valid (tiny) filter.
    pub fn new(expected_keys: usize, bits_per_key: usize) -> Self {
        let expected = expected_keys.max(1);
        let bpk = bits_per_key.max(1);

        // Round up to a multiple of 64 for word packing.
        let raw_bits = (expected * bpk) as u64;
        let num_bits = (raw_bits + 63) / 64 * 64;

        // Optimal probe count k = (m/n) * ln 2.
        let num_hashes = ((bpk as f64 * std::f64::consts::LN_2).round() as u32).max(1);

        Self {
            bits: vec![0u64; (num_bits / 64) as usize],
            num_bits,
            num_hashes,
            inserted: 0,
        }
    }

    /// Set the probe bits for `key`. Idempotent.
    pub fn insert(&mut self, key: u64) {
        let (h1, h2) = probe_hashes(key);
        for i in 0..self.num_hashes as u64 {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            self.bits[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
        self.inserted += 1;
    }

    /// `false` means the key was never inserted; `true` means it may have
    /// been.
    pub fn contains(&self, key: u64) -> bool {
        let (h1, h2) = probe_hashes(key);
        for i in 0..self.num_hashes as u64 {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            if self.bits[(bit / 64) as usize] & (1u64 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }

    /// Reset all bits, keeping the allocated size.
    pub fn clear(&mut self) {
        self.bits.fill(0);
        self.inserted = 0;
    }

    /// Resident size of the bit array in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.bits.capacity() * std::mem::size_of::<u64>()
    }

    /// Theoretical false-positive rate for the current fill:
    /// `(1 - e^(-kn/m))^k`.
    pub fn false_positive_rate(&self) -> f64 {
        if self.inserted == 0 {
            return 0.0;
        }
        let exponent =
            -((self.num_hashes as u64 * self.inserted as u64) as f64) / self.num_bits as f64;
        (1.0 - exponent.exp()).powi(self.num_hashes as i32)
    }

    /// Total bits in the filter.
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Probe count per key.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Number of `insert` calls since construction or `clear`.
    pub fn inserted(&self) -> usize {
        self.inserted
    }
}

/// Derive the two double-hashing bases for a key: `h1` from seed 0, `h2`
/// from reseeding with `h1`.
#[inline]
fn probe_hashes(key: u64) -> (u64, u64) {
    let h1 = hash_key(key, 0);
    let h2 = hash_key(key, h1);
    (h1, h2)
}

#[inline]
fn hash_key(key: u64, seed: u64) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write(&key.to_le_bytes());
    hasher.finish()
}
