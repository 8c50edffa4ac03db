//! In-memory transactional storage.
//!
//! Useful for tests and ephemeral accumulators. Committed data lives in a
//! `BTreeMap` per key space; a transaction buffers its writes and applies
//! them under a single lock on commit, so readers never observe half of a
//! transaction.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::RwLock;
use tracing::warn;

use crate::{Error, KeySpace, Storage, StorageTransaction};

type Entries = BTreeMap<(KeySpace, Vec<u8>), Vec<u8>>;

/// In-memory store backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemStorage {
    data: RwLock<Entries>,
    failing_commits: AtomicUsize,
}

impl MemStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with [`Error::CommitRejected`]
    /// without applying any of their writes.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Number of committed entries in `space`.
    pub fn len(&self, space: KeySpace) -> usize {
        self.data
            .read()
            .keys()
            .filter(|(entry_space, _)| *entry_space == space)
            .count()
    }

    /// Whether `space` holds no committed entries.
    pub fn is_empty(&self, space: KeySpace) -> bool {
        self.len(space) == 0
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok()
    }
}

impl Storage for MemStorage {
    type Transaction<'db> = MemTransaction<'db>;

    fn start_transaction(&self) -> Self::Transaction<'_> {
        MemTransaction {
            storage: self,
            writes: RefCell::new(BTreeMap::new()),
        }
    }

    fn get<K: AsRef<[u8]>>(&self, space: KeySpace, key: K) -> Result<Option<Vec<u8>>, Error> {
        Ok(self
            .data
            .read()
            .get(&(space, key.as_ref().to_vec()))
            .cloned())
    }

    fn scan(&self, space: KeySpace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        Ok(self
            .data
            .read()
            .range((space, Vec::new())..)
            .take_while(|((entry_space, _), _)| *entry_space == space)
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect())
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Pending writes against a [`MemStorage`].
pub struct MemTransaction<'db> {
    storage: &'db MemStorage,
    writes: RefCell<Entries>,
}

impl StorageTransaction for MemTransaction<'_> {
    fn get<K: AsRef<[u8]>>(&self, space: KeySpace, key: K) -> Result<Option<Vec<u8>>, Error> {
        let entry = (space, key.as_ref().to_vec());
        if let Some(value) = self.writes.borrow().get(&entry) {
            return Ok(Some(value.clone()));
        }
        Ok(self.storage.data.read().get(&entry).cloned())
    }

    fn put<K: AsRef<[u8]>>(&self, space: KeySpace, key: K, value: &[u8]) -> Result<(), Error> {
        self.writes
            .borrow_mut()
            .insert((space, key.as_ref().to_vec()), value.to_vec());
        Ok(())
    }

    fn commit(self) -> Result<(), Error> {
        let writes = self.writes.into_inner();
        if self.storage.take_injected_failure() {
            warn!(writes = writes.len(), "rejecting commit by injected failure");
            return Err(Error::CommitRejected(format!(
                "injected failure, {} writes discarded",
                writes.len()
            )));
        }
        self.storage.data.write().extend(writes);
        Ok(())
    }

    fn rollback(self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_uncommitted_writes_are_invisible() {
        let storage = MemStorage::new();
        let tx = storage.start_transaction();
        tx.put(KeySpace::Index, b"key", b"value").unwrap();

        assert_eq!(tx.get(KeySpace::Index, b"key").unwrap(), Some(b"value".to_vec()));
        assert_eq!(storage.get(KeySpace::Index, b"key").unwrap(), None);

        tx.commit().expect("cannot commit transaction");
        assert_eq!(
            storage.get(KeySpace::Index, b"key").unwrap(),
            Some(b"value".to_vec())
        );
    }

    #[test]
    fn test_dropped_transaction_is_discarded() {
        let storage = MemStorage::new();
        {
            let tx = storage.start_transaction();
            tx.put(KeySpace::Meta, b"count", &[1]).unwrap();
        }
        let tx = storage.start_transaction();
        tx.put(KeySpace::Meta, b"other", &[2]).unwrap();
        tx.rollback().unwrap();

        assert!(storage.is_empty(KeySpace::Meta));
    }

    #[test]
    fn test_injected_failures_apply_nothing() {
        let storage = MemStorage::new();
        storage.fail_next_commits(1);

        let tx = storage.start_transaction();
        tx.put(KeySpace::Leaves, b"a", b"1").unwrap();
        assert_matches!(tx.commit(), Err(Error::CommitRejected(_)));
        assert!(storage.is_empty(KeySpace::Leaves));

        let tx = storage.start_transaction();
        tx.put(KeySpace::Leaves, b"a", b"1").unwrap();
        tx.commit().expect("second commit should go through");
        assert_eq!(storage.len(KeySpace::Leaves), 1);
    }

    #[test]
    fn test_scan_stays_within_space_and_is_ordered() {
        let storage = MemStorage::new();
        let tx = storage.start_transaction();
        tx.put(KeySpace::Leaves, [0u8, 2], b"c").unwrap();
        tx.put(KeySpace::Leaves, [0u8, 1], b"b").unwrap();
        tx.put(KeySpace::Index, b"x", b"a").unwrap();
        tx.put(KeySpace::Meta, b"y", b"d").unwrap();
        tx.commit().unwrap();

        let leaves = storage.scan(KeySpace::Leaves).unwrap();
        assert_eq!(
            leaves,
            vec![
                (vec![0, 1], b"b".to_vec()),
                (vec![0, 2], b"c".to_vec())
            ]
        );
    }
}
