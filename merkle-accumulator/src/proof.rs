//! Inclusion proofs.
//!
//! A proof is the list of sibling digests from a leaf up to (not including)
//! the root, each tagged with the side the path node sits on. Verification
//! is a pure fold of the combine rule and needs no storage.

use bincode::{Decode, Encode};

use crate::{
    hash::{Digest, MerkleHasher},
    Error,
};

/// Maximum path length accepted when decoding or verifying. A tree of this
/// depth would hold `2^64` leaves.
const MAX_PROOF_DEPTH: usize = 64;

/// Side of the *current* node relative to its sibling at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Direction {
    /// Current node is the left child; parent = `H(current, sibling)`.
    Left,
    /// Current node is the right child; parent = `H(sibling, current)`.
    Right,
}

/// One step of an inclusion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct ProofNode {
    /// Digest of the sibling at this level; the node itself when it has none.
    pub sibling: Digest,
    /// Side of the path node.
    pub direction: Direction,
}

/// Inclusion path for the leaf at `position`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct InclusionProof {
    /// Leaf position the path starts from.
    pub position: u64,
    /// Sibling digests, leaf level first.
    pub path: Vec<ProofNode>,
}

impl InclusionProof {
    /// Length of the path, equal to the tree depth it was generated from.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Replay the combine rule from `leaf` through the path.
    ///
    /// Fails if the path is longer than [`MAX_PROOF_DEPTH`] or if a recorded
    /// direction disagrees with the corresponding bit of `position`.
    pub fn compute_root<H: MerkleHasher>(&self, hasher: &H, leaf: &Digest) -> Result<Digest, Error> {
        if self.path.len() > MAX_PROOF_DEPTH {
            return Err(Error::InvalidProof(format!(
                "path of length {} exceeds maximum depth {}",
                self.path.len(),
                MAX_PROOF_DEPTH
            )));
        }
        if self.path.len() < MAX_PROOF_DEPTH && self.position >> self.path.len() != 0 {
            return Err(Error::InvalidProof(format!(
                "position {} does not fit a path of length {}",
                self.position,
                self.path.len()
            )));
        }

        let mut current = *leaf;
        for (height, node) in self.path.iter().enumerate() {
            let expected = if (self.position >> height) & 1 == 0 {
                Direction::Left
            } else {
                Direction::Right
            };
            if node.direction != expected {
                return Err(Error::InvalidProof(format!(
                    "direction at height {} does not match position {}",
                    height, self.position
                )));
            }
            current = match node.direction {
                Direction::Left => hasher.combine(&current, &node.sibling),
                Direction::Right => hasher.combine(&node.sibling, &current),
            };
        }
        Ok(current)
    }

    /// Verify that `leaf` is included under `expected_root`.
    pub fn verify<H: MerkleHasher>(
        &self,
        hasher: &H,
        leaf: &Digest,
        expected_root: &Digest,
    ) -> Result<(), Error> {
        let computed_root = self.compute_root(hasher, leaf)?;
        if &computed_root != expected_root {
            return Err(Error::InvalidProof(format!(
                "root hash mismatch: expected {}, got {}",
                expected_root, computed_root
            )));
        }
        Ok(())
    }

    /// Encode to bytes using bincode.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, Error> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_no_limit();
        bincode::encode_to_vec(self, config)
            .map_err(|e| Error::InvalidProof(format!("encode error: {}", e)))
    }

    /// Decode from bytes using bincode.
    ///
    /// Rejects paths longer than [`MAX_PROOF_DEPTH`] and trailing bytes.
    pub fn decode_from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_limit::<{ 64 * 1024 }>();
        let (proof, read): (Self, _) = bincode::decode_from_slice(bytes, config)
            .map_err(|e| Error::InvalidProof(format!("decode error: {}", e)))?;
        if read != bytes.len() {
            return Err(Error::InvalidProof(format!(
                "{} trailing bytes after proof",
                bytes.len() - read
            )));
        }
        if proof.path.len() > MAX_PROOF_DEPTH {
            return Err(Error::InvalidProof(format!(
                "path of length {} exceeds maximum depth {}",
                proof.path.len(),
                MAX_PROOF_DEPTH
            )));
        }
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{hash::Blake3Hasher, tree::TreeStore};

    fn tree_with(count: u64) -> (TreeStore, Vec<Digest>) {
        let hasher = Blake3Hasher;
        let leaves: Vec<Digest> = (0..count)
            .map(|i| hasher.hash_one(&Digest::from_limbs([i, 1, 2, 3])))
            .collect();
        let mut tree = TreeStore::new();
        tree.build_from_leaves(&hasher, leaves.clone())
            .expect("non-empty leaves");
        (tree, leaves)
    }

    #[test]
    fn test_verify_rejects_wrong_leaf_and_root() {
        let (tree, leaves) = tree_with(6);
        let root = tree.root().unwrap();
        let proof = tree.path_for(4).unwrap();

        proof
            .verify(&Blake3Hasher, &leaves[4], &root)
            .expect("valid proof");
        assert_matches!(
            proof.verify(&Blake3Hasher, &leaves[3], &root),
            Err(Error::InvalidProof(_))
        );
        assert_matches!(
            proof.verify(&Blake3Hasher, &leaves[4], &leaves[0]),
            Err(Error::InvalidProof(_))
        );
    }

    #[test]
    fn test_tampered_sibling_fails() {
        let (tree, leaves) = tree_with(8);
        let root = tree.root().unwrap();
        let mut proof = tree.path_for(5).unwrap();
        proof.path[1].sibling = Digest::new([0u8; 32]);
        assert!(proof.verify(&Blake3Hasher, &leaves[5], &root).is_err());
    }

    #[test]
    fn test_direction_must_match_position() {
        let (tree, leaves) = tree_with(4);
        let mut proof = tree.path_for(1).unwrap();
        proof.path[0].direction = Direction::Left;
        assert_matches!(
            proof.compute_root(&Blake3Hasher, &leaves[1]),
            Err(Error::InvalidProof(msg)) if msg.contains("direction at height 0")
        );

        let mut proof = tree.path_for(1).unwrap();
        proof.position = 5;
        assert_matches!(
            proof.compute_root(&Blake3Hasher, &leaves[1]),
            Err(Error::InvalidProof(msg)) if msg.contains("does not fit")
        );
    }

    #[test]
    fn test_encode_decode() {
        let (tree, _) = tree_with(11);
        let proof = tree.path_for(10).unwrap();
        let bytes = proof.encode_to_vec().unwrap();
        assert_eq!(InclusionProof::decode_from_slice(&bytes).unwrap(), proof);

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(InclusionProof::decode_from_slice(&trailing).is_err());
        assert!(InclusionProof::decode_from_slice(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_decode_rejects_overlong_path() {
        let proof = InclusionProof {
            position: 0,
            path: vec![
                ProofNode {
                    sibling: Digest::default(),
                    direction: Direction::Left,
                };
                MAX_PROOF_DEPTH + 1
            ],
        };
        let bytes = proof.encode_to_vec().unwrap();
        assert_matches!(
            InclusionProof::decode_from_slice(&bytes),
            Err(Error::InvalidProof(msg)) if msg.contains("exceeds maximum depth")
        );
    }
}
