#![deny(missing_docs)]

//! Transactional storage abstraction for the Merkle accumulator.
//!
//! The accumulator only needs a handful of primitives from its durable
//! store: start a transaction, read and write inside it, commit or discard
//! it, and scan a key space in key order. [`Storage`] and
//! [`StorageTransaction`] describe exactly that; [`rocksdb_storage`] provides
//! the production backend and [`mem_storage`] an in-memory one for tests.

pub mod error;
#[cfg(any(test, feature = "mem_storage"))]
pub mod mem_storage;
#[cfg(feature = "rocksdb_storage")]
pub mod rocksdb_storage;
mod storage;

pub use crate::{
    error::Error,
    storage::{KeySpace, Storage, StorageTransaction},
};
