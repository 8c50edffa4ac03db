use std::collections::HashSet;

use accumulator_storage::Storage;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::{
    hash::{Blake3Hasher, Digest, MerkleHasher},
    leaf_index::{IndexEntry, LeafIndex},
    options::AccumulatorOptions,
    proof::InclusionProof,
    tree::TreeStore,
    Error,
};

#[derive(Debug, Default)]
struct TreeState {
    tree: TreeStore,
    /// Set when the tree was mutated but the matching index commit failed.
    contaminated: bool,
}

impl TreeState {
    fn ensure_clean(&self) -> Result<(), Error> {
        if self.contaminated {
            return Err(Error::Contaminated);
        }
        Ok(())
    }
}

/// Append-only Merkle accumulator over key-indexed values.
///
/// The accumulator owns a [`LeafIndex`] in durable storage and an in-memory
/// [`TreeStore`] rebuilt from it on open. A key is committed to the tree if
/// and only if it is indexed at the matching position.
///
/// All methods take `&self`; an internal lock serializes mutations and lets
/// readers run concurrently with each other but never with a mutation.
///
/// ```
/// # use accumulator_storage::mem_storage::MemStorage;
/// use merkle_accumulator::{Accumulator, AccumulatorOptions, Blake3Hasher, LeafEncoding};
///
/// let options = AccumulatorOptions::default().with_leaf_encoding(LeafEncoding::ZeroPadded);
/// let acc = Accumulator::open(MemStorage::new(), Blake3Hasher, options).unwrap();
/// acc.add(b"key1", b"value1").unwrap();
///
/// let root = acc.root().unwrap();
/// let proof = acc.gen_proof(b"key1").unwrap();
/// acc.verify_proof(b"value1", &proof, &root).unwrap();
/// ```
#[derive(Debug)]
pub struct Accumulator<S: Storage, H: MerkleHasher = Blake3Hasher> {
    index: LeafIndex<S>,
    hasher: H,
    options: AccumulatorOptions,
    state: RwLock<TreeState>,
}

impl<S: Storage, H: MerkleHasher> Accumulator<S, H> {
    /// Bind `hasher` to `storage` and restore the tree from committed leaves.
    ///
    /// A fresh store records the hasher id; a populated one must have been
    /// built with the same hasher.
    pub fn open(storage: S, hasher: H, options: AccumulatorOptions) -> Result<Self, Error> {
        let index = LeafIndex::new(storage);
        match index.hasher_id()? {
            Some(id) if id != hasher.id() => {
                return Err(Error::CorruptedData(format!(
                    "store was built with hasher {}, opened with {}",
                    id,
                    hasher.id()
                )));
            }
            Some(_) => {}
            None => index.record_hasher_id(hasher.id())?,
        }

        let accumulator = Accumulator {
            index,
            hasher,
            options,
            state: RwLock::new(TreeState::default()),
        };
        {
            let mut state = accumulator.state.write();
            accumulator.rebuild(&mut state, accumulator.options.verify_on_open)?;
            info!(
                leaf_count = state.tree.leaf_count(),
                hasher = accumulator.hasher.id(),
                "accumulator opened"
            );
        }
        Ok(accumulator)
    }

    /// Append `value` under `key` and return the new root.
    pub fn add(&self, key: &[u8], value: &[u8]) -> Result<Digest, Error> {
        let mut state = self.state.write();
        state.ensure_clean()?;

        if self.index.contains(key)? {
            warn!(key = %hex::encode(key), "add rejected, key exists");
            return Err(Error::key_exists(key));
        }
        let leaf = self.leaf_digest(value)?;

        let position = state.tree.leaf_count();
        let root = state.tree.append_leaf(&self.hasher, leaf)?;
        if let Err(e) = self.index.insert(key, position, &leaf) {
            state.contaminated = true;
            error!(position, error = %e, "index commit failed after append, accumulator contaminated");
            return Err(e);
        }

        debug!(position, root = %root, "leaf added");
        Ok(root)
    }

    /// Append `values` under `keys` in order and return the new root.
    ///
    /// The tree is rebuilt from the complete leaf history (every committed
    /// leaf followed by the batch), and the batch keys take the positions
    /// after the committed ones. The result is the same as adding the pairs
    /// one by one. When the accumulator is contaminated the history is
    /// reloaded from storage, so a successful batch also clears the flag.
    pub fn add_batch<K, V>(&self, keys: &[K], values: &[V]) -> Result<Digest, Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        if keys.len() != values.len() {
            return Err(Error::LengthMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }

        let mut state = self.state.write();

        let mut seen = HashSet::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            if !seen.insert(key) || self.index.contains(key)? {
                warn!(key = %hex::encode(key), "batch rejected, key exists");
                return Err(Error::key_exists(key));
            }
        }
        let batch_leaves = values
            .iter()
            .map(|value| self.leaf_digest(value.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        if batch_leaves.is_empty() {
            if state.contaminated {
                self.rebuild(&mut state, true)?;
            }
            return state.tree.root();
        }

        let mut leaves = if state.contaminated {
            self.index.load_leaves()?
        } else {
            state.tree.leaves().to_vec()
        };

        let first_position = leaves.len() as u64;
        let entries: Vec<IndexEntry<'_>> = keys
            .iter()
            .zip(&batch_leaves)
            .zip(first_position..)
            .map(|((key, leaf), position)| (key.as_ref(), position, *leaf))
            .collect();
        leaves.extend_from_slice(&batch_leaves);

        let root = state.tree.build_from_leaves(&self.hasher, leaves)?;
        state.contaminated = true;
        if let Err(e) = self.index.insert_batch(&entries) {
            error!(
                first_position,
                count = entries.len(),
                error = %e,
                "index commit failed after rebuild, accumulator contaminated"
            );
            return Err(e);
        }
        state.contaminated = false;

        info!(
            first_position,
            count = entries.len(),
            leaf_count = state.tree.leaf_count(),
            root = %root,
            "batch added"
        );
        Ok(root)
    }

    /// Current root. Fails with `EmptyTree` before the first leaf.
    pub fn root(&self) -> Result<Digest, Error> {
        let state = self.state.read();
        state.ensure_clean()?;
        state.tree.root()
    }

    /// Inclusion proof for `key` against the current root.
    pub fn gen_proof(&self, key: &[u8]) -> Result<InclusionProof, Error> {
        let state = self.state.read();
        state.ensure_clean()?;
        let position = self.index.lookup(key)?;
        state.tree.path_for(position)
    }

    /// Proofs for several keys, all taken against the same root.
    pub fn gen_proofs<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Vec<InclusionProof>, Error> {
        let state = self.state.read();
        state.ensure_clean()?;
        keys.iter()
            .map(|key| {
                let position = self.index.lookup(key.as_ref())?;
                state.tree.path_for(position)
            })
            .collect()
    }

    /// Discard the in-memory tree and rebuild it from committed leaves,
    /// checking the index first. Clears the contaminated flag on success.
    pub fn recover(&self) -> Result<(), Error> {
        let mut state = self.state.write();
        self.rebuild(&mut state, true)?;
        info!(leaf_count = state.tree.leaf_count(), "accumulator recovered");
        Ok(())
    }

    fn rebuild(&self, state: &mut TreeState, verify: bool) -> Result<(), Error> {
        state.contaminated = true;
        if verify {
            self.index.check_consistency()?;
        }
        let leaves = self.index.load_leaves()?;
        if leaves.is_empty() {
            state.tree = TreeStore::new();
        } else {
            state.tree.build_from_leaves(&self.hasher, leaves)?;
        }
        state.contaminated = false;
        Ok(())
    }

    /// Leaf digest `value` would get, after applying the configured
    /// [`LeafEncoding`](crate::LeafEncoding).
    pub fn leaf_digest(&self, value: &[u8]) -> Result<Digest, Error> {
        let encoded = self.options.leaf_encoding.encode(value)?;
        self.hasher.leaf_digest(&encoded)
    }

    /// Verify that `value` is included under `root` according to `proof`.
    pub fn verify_proof(
        &self,
        value: &[u8],
        proof: &InclusionProof,
        root: &Digest,
    ) -> Result<(), Error> {
        let leaf = self.leaf_digest(value)?;
        proof.verify(&self.hasher, &leaf, root)
    }

    pub fn leaf_count(&self) -> u64 {
        self.state.read().tree.leaf_count()
    }

    pub fn depth(&self) -> usize {
        self.state.read().tree.depth()
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool, Error> {
        self.index.contains(key)
    }

    pub fn position_of(&self, key: &[u8]) -> Result<u64, Error> {
        self.index.lookup(key)
    }

    pub fn is_contaminated(&self) -> bool {
        self.state.read().contaminated
    }

    pub fn storage(&self) -> &S {
        self.index.storage()
    }

    /// Release the underlying store, e.g. to reopen it later.
    pub fn into_storage(self) -> S {
        self.index.into_storage()
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn options(&self) -> &AccumulatorOptions {
        &self.options
    }
}
