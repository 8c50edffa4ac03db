// MIT LICENSE
//
// Copyright (c) 2021 Dash Core Group
//
// Permission is hereby granted, free of charge, to any
// person obtaining a copy of this software and associated
// documentation files (the "Software"), to deal in the
// Software without restriction, including without
// limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software
// is furnished to do so, subject to the following
// conditions:
//
// The above copyright notice and this permission notice
// shall be included in all copies or substantial portions
// of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF
// ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED
// TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A
// PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
// SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY
// CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR
// IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Storage for the accumulator

use std::sync::Arc;

use crate::Error;

/// Independent key spaces of the store.
///
/// Each space is a separate column family on RocksDB, so keys never collide
/// across spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeySpace {
    /// External key bytes to leaf position.
    Index,
    /// Leaf position to leaf digest.
    Leaves,
    /// Store metadata (leaf count, hasher identifier).
    Meta,
}

impl KeySpace {
    /// All key spaces, in column family creation order.
    pub const ALL: [KeySpace; 3] = [KeySpace::Index, KeySpace::Leaves, KeySpace::Meta];

    /// Column family name backing this key space.
    pub fn name(self) -> &'static str {
        match self {
            KeySpace::Index => "index",
            KeySpace::Leaves => "leaves",
            KeySpace::Meta => "meta",
        }
    }
}

/// Top-level storage abstraction.
/// Should be able to hold storage connection and to start transaction when
/// needed. Reads outside of a transaction see committed data only.
pub trait Storage: Send + Sync {
    /// Storage transaction type
    type Transaction<'db>: StorageTransaction
    where
        Self: 'db;

    /// Starts a new transaction
    fn start_transaction(&self) -> Self::Transaction<'_>;

    /// Get committed entry by `key` from `space`
    fn get<K: AsRef<[u8]>>(&self, space: KeySpace, key: K) -> Result<Option<Vec<u8>>, Error>;

    /// Collect every committed entry of `space` in ascending key order
    fn scan(&self, space: KeySpace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error>;

    /// Forces data to be written
    fn flush(&self) -> Result<(), Error>;
}

/// Write transaction with commit-or-discard semantics.
///
/// A transaction dropped without [`commit`](StorageTransaction::commit)
/// is discarded, so early returns never leak pending writes.
pub trait StorageTransaction: Sized {
    /// Get entry by `key` from `space`, observing this transaction's own
    /// uncommitted writes
    fn get<K: AsRef<[u8]>>(&self, space: KeySpace, key: K) -> Result<Option<Vec<u8>>, Error>;

    /// Put `value` into `space` with `key`
    fn put<K: AsRef<[u8]>>(&self, space: KeySpace, key: K, value: &[u8]) -> Result<(), Error>;

    /// Consumes and commits the transaction
    fn commit(self) -> Result<(), Error>;

    /// Consumes and discards the transaction
    fn rollback(self) -> Result<(), Error>;
}

impl<S: Storage> Storage for Arc<S> {
    type Transaction<'db>
        = S::Transaction<'db>
    where
        Self: 'db;

    fn start_transaction(&self) -> Self::Transaction<'_> {
        self.as_ref().start_transaction()
    }

    fn get<K: AsRef<[u8]>>(&self, space: KeySpace, key: K) -> Result<Option<Vec<u8>>, Error> {
        self.as_ref().get(space, key)
    }

    fn scan(&self, space: KeySpace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        self.as_ref().scan(space)
    }

    fn flush(&self) -> Result<(), Error> {
        self.as_ref().flush()
    }
}

impl<S: Storage> Storage for &S {
    type Transaction<'db>
        = S::Transaction<'db>
    where
        Self: 'db;

    fn start_transaction(&self) -> Self::Transaction<'_> {
        (**self).start_transaction()
    }

    fn get<K: AsRef<[u8]>>(&self, space: KeySpace, key: K) -> Result<Option<Vec<u8>>, Error> {
        (**self).get(space, key)
    }

    fn scan(&self, space: KeySpace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        (**self).scan(space)
    }

    fn flush(&self) -> Result<(), Error> {
        (**self).flush()
    }
}
