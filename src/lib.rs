//! HALI - Hierarchical adaptive learned index for in-memory point lookups
//! over ordered 64-bit integer keys.
//!
//! The composed index layers a binary-search range router over
//! heterogeneous per-partition experts (piecewise-linear segments, a
//! two-layer recursive linear model, or an exact ordered map, picked from
//! data statistics and a compression level), fronted by Bloom filters and
//! backed by a write-through delta buffer. Each expert family is also
//! usable standalone through the same [`OrderedIndex`] operation set, so
//! embedders can compare them directly.

// ===== Core modules =====

// Error taxonomy for bulk construction
pub mod error;

// Shared operation set for all index families
pub mod index;

// Bounded-window correction search shared by the learned experts
pub(crate) mod search;

// Bloom filter: double-hashed membership sieve
pub mod bloom;

// PLS expert: piecewise-linear segments with a fixed error bound
pub mod pls;

// RLM expert: two-layer recursive linear model
pub mod rlm;

// OT expert: exact ordered-map index
pub mod ot;

// Delta buffer: post-build write absorption
pub mod delta;

// Build configuration: compression level and derived parameters
pub mod config;

// HALI: router + experts + Bloom filters + delta buffer
pub mod hali;

// ===== Public API =====

pub use bloom::BloomFilter;
pub use config::{HaliConfig, DEFAULT_COMPRESSION};
pub use delta::DeltaBuffer;
pub use error::IndexError;
pub use hali::{ExpertKind, HaliIndex, HaliStats};
pub use index::OrderedIndex;
pub use ot::OtIndex;
pub use pls::{PlsIndex, PLS_EPSILON};
pub use rlm::{linearity, RlmIndex, DEFAULT_LEAF_MODELS, RLM_EPSILON};
