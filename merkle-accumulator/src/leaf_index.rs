//! Durable key to leaf position mapping.
//!
//! Besides the index itself the store keeps the leaf digests by position and
//! a leaf counter, all written in the same transaction as the index entries.
//! The tree can therefore always be rebuilt from committed data alone.

use std::collections::HashSet;

use accumulator_storage::{KeySpace, Storage, StorageTransaction};
use tracing::{debug, warn};

use crate::{
    hash::{Digest, DIGEST_SIZE},
    Error,
};

const LEAF_COUNT_KEY: &[u8] = b"leaf_count";
const HASHER_ID_KEY: &[u8] = b"hasher_id";

/// One entry of an index batch: external key, leaf position and the leaf
/// digest stored at that position.
pub type IndexEntry<'a> = (&'a [u8], u64, Digest);

/// Mapping from opaque key bytes to leaf positions.
///
/// Positions are dense: the entries committed so far cover exactly
/// `0..leaf_count`, and a new entry must take the next free position.
#[derive(Debug)]
pub struct LeafIndex<S> {
    storage: S,
}

impl<S: Storage> LeafIndex<S> {
    pub fn new(storage: S) -> Self {
        LeafIndex { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Durably record `key -> position` together with its leaf.
    ///
    /// Fails with `KeyExists` if the key is already indexed. Nothing is
    /// written unless the whole transaction commits.
    pub fn insert(&self, key: &[u8], position: u64, leaf: &Digest) -> Result<(), Error> {
        self.insert_batch(&[(key, position, *leaf)])
    }

    /// Durably record several entries in one transaction.
    ///
    /// Any key already stored, or repeated within `entries`, aborts the whole
    /// batch with `KeyExists`. Positions must continue the dense sequence.
    pub fn insert_batch(&self, entries: &[IndexEntry<'_>]) -> Result<(), Error> {
        if entries.is_empty() {
            return Ok(());
        }

        let tx = self.storage.start_transaction();
        let mut next_position = read_leaf_count(&tx)?;
        let mut seen = HashSet::with_capacity(entries.len());

        for (key, position, leaf) in entries {
            if !seen.insert(*key) || tx.get(KeySpace::Index, key)?.is_some() {
                warn!(key = %hex::encode(key), "rejecting duplicate key");
                return Err(Error::key_exists(key));
            }
            if *position != next_position {
                return Err(Error::CorruptedData(format!(
                    "position {} does not continue the leaf sequence at {}",
                    position, next_position
                )));
            }
            tx.put(KeySpace::Index, key, &position.to_le_bytes())?;
            tx.put(KeySpace::Leaves, position.to_be_bytes(), leaf.as_bytes())?;
            next_position += 1;
        }
        tx.put(KeySpace::Meta, LEAF_COUNT_KEY, &next_position.to_le_bytes())?;
        tx.commit()?;

        debug!(entries = entries.len(), leaf_count = next_position, "index batch committed");
        Ok(())
    }

    /// Position of `key`, or `KeyNotFound`.
    pub fn lookup(&self, key: &[u8]) -> Result<u64, Error> {
        match self.storage.get(KeySpace::Index, key)? {
            Some(bytes) => decode_u64(&bytes, "index position"),
            None => Err(Error::key_not_found(key)),
        }
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool, Error> {
        Ok(self.storage.get(KeySpace::Index, key)?.is_some())
    }

    /// Number of committed leaves.
    pub fn leaf_count(&self) -> Result<u64, Error> {
        self.storage
            .get(KeySpace::Meta, LEAF_COUNT_KEY)?
            .map_or(Ok(0), |bytes| decode_u64(&bytes, "leaf count"))
    }

    /// Committed leaf digests in position order.
    ///
    /// Fails with `CorruptedData` if positions have gaps or the sequence does
    /// not match the stored leaf count.
    pub fn load_leaves(&self) -> Result<Vec<Digest>, Error> {
        let leaf_count = self.leaf_count()?;
        let entries = self.storage.scan(KeySpace::Leaves)?;
        if entries.len() as u64 != leaf_count {
            return Err(Error::CorruptedData(format!(
                "{} stored leaves for leaf count {}",
                entries.len(),
                leaf_count
            )));
        }

        entries
            .into_iter()
            .enumerate()
            .map(|(expected, (key, value))| {
                let position = u64::from_be_bytes(key.as_slice().try_into().map_err(|_| {
                    Error::CorruptedData(format!("leaf key of {} bytes", key.len()))
                })?);
                if position != expected as u64 {
                    return Err(Error::CorruptedData(format!(
                        "leaf position {} found where {} was expected",
                        position, expected
                    )));
                }
                Digest::try_from(value.as_slice()).map_err(|_| {
                    Error::CorruptedData(format!(
                        "leaf {} has {} bytes instead of {}",
                        position,
                        value.len(),
                        DIGEST_SIZE
                    ))
                })
            })
            .collect()
    }

    /// Check that every index entry points at a distinct committed leaf and
    /// that every leaf is indexed.
    pub fn check_consistency(&self) -> Result<(), Error> {
        let leaf_count = self.leaf_count()?;
        let entries = self.storage.scan(KeySpace::Index)?;
        if entries.len() as u64 != leaf_count {
            return Err(Error::CorruptedData(format!(
                "{} index entries for leaf count {}",
                entries.len(),
                leaf_count
            )));
        }

        let mut used = vec![false; entries.len()];
        for (key, value) in entries {
            let position = decode_u64(&value, "index position")?;
            match used.get_mut(position as usize) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(Error::CorruptedData(format!(
                        "position {} is indexed twice, again by key {}",
                        position,
                        hex::encode(&key)
                    )));
                }
                None => {
                    return Err(Error::CorruptedData(format!(
                        "key {} points at position {} beyond leaf count {}",
                        hex::encode(&key),
                        position,
                        leaf_count
                    )));
                }
            }
        }
        Ok(())
    }

    /// Identifier of the hasher the stored leaves were built with.
    pub fn hasher_id(&self) -> Result<Option<String>, Error> {
        self.storage
            .get(KeySpace::Meta, HASHER_ID_KEY)?
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| Error::CorruptedData(format!("hasher id is not utf-8: {}", e)))
            })
            .transpose()
    }

    pub fn record_hasher_id(&self, id: &str) -> Result<(), Error> {
        let tx = self.storage.start_transaction();
        tx.put(KeySpace::Meta, HASHER_ID_KEY, id.as_bytes())?;
        tx.commit()?;
        Ok(())
    }
}

fn read_leaf_count<T: StorageTransaction>(tx: &T) -> Result<u64, Error> {
    tx.get(KeySpace::Meta, LEAF_COUNT_KEY)?
        .map_or(Ok(0), |bytes| decode_u64(&bytes, "leaf count"))
}

fn decode_u64(bytes: &[u8], what: &str) -> Result<u64, Error> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| {
        Error::CorruptedData(format!("{} has {} bytes instead of 8", what, bytes.len()))
    })?;
    Ok(u64::from_le_bytes(array))
}
