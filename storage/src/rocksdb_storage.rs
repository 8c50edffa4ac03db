//! Accumulator storage layer implemented over RocksDB backend.
mod storage;
pub mod test_utils;
mod transaction;

pub use self::{storage::RocksDbStorage, transaction::RocksDbTransaction};
