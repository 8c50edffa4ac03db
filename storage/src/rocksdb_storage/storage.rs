//! Impementation for a storage abstraction over RocksDB.
use std::{fmt, path::Path};

use lazy_static::lazy_static;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, OptimisticTransactionDB,
    OptimisticTransactionOptions, WriteOptions,
};
use tracing::debug;

use super::RocksDbTransaction;
use crate::{Error, KeySpace, Storage};

lazy_static! {
    static ref DEFAULT_OPTS: rocksdb::Options = {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_allow_mmap_writes(true);
        opts.set_allow_mmap_reads(true);
        opts.create_missing_column_families(true);
        opts.set_atomic_flush(true);
        opts
    };
}

/// Storage which uses RocksDB as its backend.
///
/// Every [`KeySpace`] lives in its own column family. Transactions are
/// optimistic: conflicting writers are detected at commit time.
pub struct RocksDbStorage {
    db: OptimisticTransactionDB,
    sync_writes: bool,
}

impl fmt::Debug for RocksDbStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksDbStorage")
            .field("sync_writes", &self.sync_writes)
            .finish_non_exhaustive()
    }
}

impl RocksDbStorage {
    /// Open (or create) a database at `path` with all key spaces present.
    ///
    /// Commits are synced to disk before returning.
    pub fn default_rocksdb_with_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let db = OptimisticTransactionDB::open_cf_descriptors(
            &DEFAULT_OPTS,
            &path,
            KeySpace::ALL
                .iter()
                .map(|space| ColumnFamilyDescriptor::new(space.name(), DEFAULT_OPTS.clone())),
        )?;
        debug!(path = %path.as_ref().display(), "opened rocksdb storage");

        Ok(RocksDbStorage {
            db,
            sync_writes: true,
        })
    }

    /// Toggle `fsync` on commit. Disabling it trades crash durability of the
    /// most recent commits for throughput.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub(super) fn cf(&self, space: KeySpace) -> Result<&ColumnFamily, Error> {
        self.db.cf_handle(space.name()).ok_or_else(|| {
            Error::CorruptedData(format!("column family {} must exist", space.name()))
        })
    }
}

impl Storage for RocksDbStorage {
    type Transaction<'db> = RocksDbTransaction<'db>;

    fn start_transaction(&self) -> Self::Transaction<'_> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        let transaction = self
            .db
            .transaction_opt(&write_opts, &OptimisticTransactionOptions::default());
        RocksDbTransaction::new(self, transaction)
    }

    fn get<K: AsRef<[u8]>>(&self, space: KeySpace, key: K) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.db.get_cf(self.cf(space)?, key)?)
    }

    fn scan(&self, space: KeySpace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        self.db
            .iterator_cf(self.cf(space)?, IteratorMode::Start)
            .map(|item| {
                item.map(|(key, value)| (key.into_vec(), value.into_vec()))
                    .map_err(Error::from)
            })
            .collect()
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(self.db.flush()?)
    }
}
