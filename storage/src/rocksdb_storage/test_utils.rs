//! Useful utilities for testing.

use std::{ops::Deref, path::Path};

use tempfile::TempDir;

use super::{RocksDbStorage, RocksDbTransaction};
use crate::{Error, KeySpace, Storage};

/// RocksDb storage with self-cleanup
#[derive(Debug)]
pub struct TempStorage {
    dir: TempDir,
    storage: RocksDbStorage,
}

impl TempStorage {
    /// Create new `TempStorage`
    pub fn new() -> Self {
        let dir = TempDir::new().expect("cannot create tempdir");
        let storage = RocksDbStorage::default_rocksdb_with_path(dir.path())
            .expect("cannot open RocksDB storage");
        TempStorage { dir, storage }
    }

    /// Directory holding the database files
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Close the database and open it again from the same directory,
    /// simulating a process restart.
    pub fn reopen(self) -> Self {
        let TempStorage { dir, storage } = self;
        drop(storage);
        let storage = RocksDbStorage::default_rocksdb_with_path(dir.path())
            .expect("cannot reopen RocksDB storage");
        TempStorage { dir, storage }
    }
}

impl Default for TempStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TempStorage {
    type Target = RocksDbStorage;

    fn deref(&self) -> &Self::Target {
        &self.storage
    }
}

impl Storage for TempStorage {
    type Transaction<'db> = RocksDbTransaction<'db>;

    fn start_transaction(&self) -> Self::Transaction<'_> {
        self.storage.start_transaction()
    }

    fn get<K: AsRef<[u8]>>(&self, space: KeySpace, key: K) -> Result<Option<Vec<u8>>, Error> {
        self.storage.get(space, key)
    }

    fn scan(&self, space: KeySpace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        self.storage.scan(space)
    }

    fn flush(&self) -> Result<(), Error> {
        self.storage.flush()
    }
}
