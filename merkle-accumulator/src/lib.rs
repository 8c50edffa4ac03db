//! Append-only Merkle accumulator.
//!
//! Values are inserted under opaque keys; each becomes a leaf at the next
//! position of a binary Merkle tree. The key to position mapping and the
//! leaf digests live in a transactional store (see
//! [`accumulator_storage`]), while the tree itself is kept in memory and
//! rebuilt from the store on open.
//!
//! # Tree shape
//!
//! Level 0 holds the leaves in insertion order. Each next level combines
//! adjacent pairs with [`MerkleHasher::combine`]; a node without a right
//! sibling is paired with itself. The root is the single node of the last
//! level, so a tree of `n` leaves has depth `ceil(log2(n))` and a single
//! leaf is its own root.
//!
//! # Failure model
//!
//! Caller errors never mutate anything. If the store rejects the commit
//! that follows a tree mutation, the accumulator is flagged contaminated and
//! refuses reads until [`Accumulator::recover`] or a successful
//! [`Accumulator::add_batch`] rebuilds it from committed data.

#![warn(missing_docs)]

mod accumulator;
mod error;
pub mod hash;
pub mod leaf_index;
mod options;
pub mod proof;
pub mod tree;

pub use accumulator_storage::{self, KeySpace, Storage, StorageTransaction};

pub use crate::{
    accumulator::Accumulator,
    error::Error,
    hash::{Blake3Hasher, Digest, MerkleHasher, DIGEST_SIZE},
    leaf_index::LeafIndex,
    options::{AccumulatorOptions, LeafEncoding},
    proof::{Direction, InclusionProof, ProofNode},
    tree::TreeStore,
};
