//! Accumulator errors

use thiserror::Error;

/// Errors from accumulator operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Key is already indexed; nothing was written
    #[error("key already exists: {0}")]
    KeyExists(String),
    /// Key was never inserted
    #[error("key not found: {0}")]
    KeyNotFound(String),
    /// Position beyond the current leaf count
    #[error("leaf position {position} is out of range (leaf count {leaf_count})")]
    IndexOutOfRange { position: u64, leaf_count: u64 },
    /// Root or proof requested before the first leaf
    #[error("tree is empty")]
    EmptyTree,
    /// Value does not fit the digest width
    #[error("invalid encoding: expected {expected} bytes, got {actual}")]
    InvalidEncoding { expected: usize, actual: usize },
    /// Batch keys and values differ in count
    #[error("length mismatch: {keys} keys, {values} values")]
    LengthMismatch { keys: usize, values: usize },
    /// The durable store failed. If the tree had already been mutated the
    /// accumulator is flagged contaminated.
    #[error("store failure: {0}")]
    StoreFailure(#[from] accumulator_storage::Error),
    /// A previous store failure left the tree ahead of the index.
    #[error("accumulator state is contaminated by a failed commit, rebuild required")]
    Contaminated,
    /// Persisted state is not what was written
    #[error("corrupted data: {0}")]
    CorruptedData(String),
    /// Proof is malformed or does not reproduce the expected root
    #[error("invalid proof: {0}")]
    InvalidProof(String),
}

impl Error {
    pub(crate) fn key_exists(key: &[u8]) -> Self {
        Error::KeyExists(hex::encode(key))
    }

    pub(crate) fn key_not_found(key: &[u8]) -> Self {
        Error::KeyNotFound(hex::encode(key))
    }
}
