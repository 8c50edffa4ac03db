use rocksdb::{OptimisticTransactionDB, Transaction};

use super::RocksDbStorage;
use crate::{Error, KeySpace, StorageTransaction};

/// Optimistic RocksDB transaction over the accumulator key spaces.
///
/// Reads go through `get_for_update`, so a concurrent commit touching the
/// same keys makes this transaction fail at commit instead of silently
/// overwriting.
/// Optimistic RocksDB transaction. Reads inside it lock the key for
/// conflict detection at commit.
pub struct RocksDbTransaction<'db> {
    storage: &'db RocksDbStorage,
    transaction: Transaction<'db, OptimisticTransactionDB>,
}

impl<'db> RocksDbTransaction<'db> {
    pub(super) fn new(
        storage: &'db RocksDbStorage,
        transaction: Transaction<'db, OptimisticTransactionDB>,
    ) -> Self {
        RocksDbTransaction {
            storage,
            transaction,
        }
    }
}

impl StorageTransaction for RocksDbTransaction<'_> {
    fn get<K: AsRef<[u8]>>(&self, space: KeySpace, key: K) -> Result<Option<Vec<u8>>, Error> {
        Ok(self
            .transaction
            .get_for_update_cf(self.storage.cf(space)?, key, true)?)
    }

    fn put<K: AsRef<[u8]>>(&self, space: KeySpace, key: K, value: &[u8]) -> Result<(), Error> {
        Ok(self
            .transaction
            .put_cf(self.storage.cf(space)?, key, value)?)
    }

    fn commit(self) -> Result<(), Error> {
        Ok(self.transaction.commit()?)
    }

    fn rollback(self) -> Result<(), Error> {
        Ok(self.transaction.rollback()?)
    }
}
