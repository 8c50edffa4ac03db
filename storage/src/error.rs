//! Storage errors

/// Storage and underlying errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rocks DB error
    #[cfg(feature = "rocksdb_storage")]
    #[error("rocksDB error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
    /// The backend refused to commit a transaction
    #[error("commit rejected: {0}")]
    CommitRejected(String),
    /// Stored bytes do not have the expected shape
    #[error("corrupted data: {0}")]
    CorruptedData(String),
}
