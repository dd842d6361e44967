//! Error taxonomy for bulk construction.
//!
//! Only `build` can fail. Every other nominal outcome (missing key on
//! `find`, duplicate key on `insert`, erase of a frozen key) is reported
//! through return values, not errors.

use thiserror::Error;

/// Errors surfaced by [`OrderedIndex::build`](crate::OrderedIndex::build).
///
/// A failed build leaves the index empty; no partial state is retained.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IndexError {
    /// `build` was called with key and value slices of different lengths.
    #[error("keys/values length mismatch: {keys} keys, {values} values")]
    InputLengthMismatch { keys: usize, values: usize },

    /// `build` input contained the same key twice.
    #[error("duplicate key in build input: {key}")]
    DuplicateKey { key: u64 },
}
