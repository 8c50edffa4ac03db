use crate::{
    hash::{Digest, MerkleHasher},
    proof::{Direction, InclusionProof, ProofNode},
    Error,
};

/// An append-only binary Merkle tree kept as an array of levels.
///
/// `levels[0]` holds the leaves in insertion order and the last level holds
/// exactly one node, the root. A node without a right sibling is paired
/// with itself: its parent is `H(x, x)`. The same rule is used when
/// building, appending and extracting paths, so every path replays to the
/// current root.
#[derive(Debug, Clone, Default)]
pub struct TreeStore {
    levels: Vec<Vec<Digest>>,
}

impl TreeStore {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole tree with one built from `leaves`.
    ///
    /// Returns `EmptyTree` (and leaves the tree empty) if `leaves` is empty.
    pub fn build_from_leaves<H: MerkleHasher>(
        &mut self,
        hasher: &H,
        leaves: Vec<Digest>,
    ) -> Result<Digest, Error> {
        self.levels.clear();
        if leaves.is_empty() {
            return Err(Error::EmptyTree);
        }
        self.levels.push(leaves);

        while let Some(current) = self.levels.last().filter(|level| level.len() > 1) {
            let next = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hasher.combine(left, right),
                    [single] => hasher.combine(single, single),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            self.levels.push(next);
        }

        self.root()
    }

    /// Append one leaf, recomputing only its ancestor chain.
    pub fn append_leaf<H: MerkleHasher>(
        &mut self,
        hasher: &H,
        leaf: Digest,
    ) -> Result<Digest, Error> {
        if self.levels.is_empty() {
            self.levels.push(Vec::new());
        }
        self.levels[0].push(leaf);

        let mut index = self.levels[0].len() - 1;
        let mut height = 0;
        while self.levels[height].len() > 1 {
            let level = &self.levels[height];
            let parent = index / 2;
            let left = level[2 * parent];
            let right = level.get(2 * parent + 1).copied().unwrap_or(left);
            let hash = hasher.combine(&left, &right);

            if height + 1 == self.levels.len() {
                self.levels.push(Vec::new());
            }
            let upper = &mut self.levels[height + 1];
            if parent < upper.len() {
                upper[parent] = hash;
            } else {
                upper.push(hash);
            }

            index = parent;
            height += 1;
        }

        self.root()
    }

    /// Current root digest.
    pub fn root(&self) -> Result<Digest, Error> {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .ok_or(Error::EmptyTree)
    }

    /// Inclusion path of the leaf at `position`, bottom-up.
    pub fn path_for(&self, position: u64) -> Result<InclusionProof, Error> {
        let leaf_count = self.leaf_count();
        if position >= leaf_count {
            return Err(Error::IndexOutOfRange {
                position,
                leaf_count,
            });
        }

        let mut index = position as usize;
        let path = self.levels[..self.levels.len() - 1]
            .iter()
            .map(|level| {
                let (sibling, direction) = if index % 2 == 0 {
                    (index + 1, Direction::Left)
                } else {
                    (index - 1, Direction::Right)
                };
                let node = ProofNode {
                    sibling: level.get(sibling).copied().unwrap_or(level[index]),
                    direction,
                };
                index /= 2;
                node
            })
            .collect();

        Ok(InclusionProof { position, path })
    }

    pub fn leaf_count(&self) -> u64 {
        self.levels.first().map_or(0, |leaves| leaves.len() as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count() == 0
    }

    /// Number of levels above the leaves, i.e. the length of every path.
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    pub fn leaf(&self, position: u64) -> Option<Digest> {
        self.levels
            .first()
            .and_then(|leaves| leaves.get(usize::try_from(position).ok()?))
            .copied()
    }

    /// All leaves in insertion order.
    pub fn leaves(&self) -> &[Digest] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::hash::Blake3Hasher;

    fn leaves(count: u32) -> Vec<Digest> {
        (0..count)
            .map(|i| {
                Blake3Hasher
                    .leaf_digest(&Digest::from_limbs([i as u64, 0, 0, 0]).to_bytes())
                    .unwrap()
            })
            .collect()
    }

    fn naive_root(hasher: &Blake3Hasher, mut level: Vec<Digest>) -> Digest {
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| hasher.combine(&pair[0], pair.get(1).unwrap_or(&pair[0])))
                .collect();
        }
        level[0]
    }

    #[test]
    fn test_empty_tree() {
        let mut tree = TreeStore::new();
        assert!(tree.is_empty());
        assert_matches!(tree.root(), Err(Error::EmptyTree));
        assert_matches!(
            tree.path_for(0),
            Err(Error::IndexOutOfRange {
                position: 0,
                leaf_count: 0
            })
        );
        assert_matches!(
            tree.build_from_leaves(&Blake3Hasher, Vec::new()),
            Err(Error::EmptyTree)
        );
    }

    #[test]
    fn test_single_leaf_is_root() {
        let leaf = leaves(1)[0];
        let mut tree = TreeStore::new();
        assert_eq!(tree.append_leaf(&Blake3Hasher, leaf).unwrap(), leaf);
        assert_eq!(tree.depth(), 0);
        assert!(tree.path_for(0).unwrap().path.is_empty());
    }

    #[test]
    fn test_three_leaves_self_pair_last() {
        let hasher = Blake3Hasher;
        let l = leaves(3);
        let mut tree = TreeStore::new();
        let root = tree.build_from_leaves(&hasher, l.clone()).unwrap();

        let left = hasher.combine(&l[0], &l[1]);
        let right = hasher.combine(&l[2], &l[2]);
        assert_eq!(root, hasher.combine(&left, &right));
        assert_eq!(tree.depth(), 2);

        let proof = tree.path_for(2).unwrap();
        assert_eq!(proof.path.len(), 2);
        assert_eq!(proof.path[0].sibling, l[2]);
        assert_eq!(proof.path[0].direction, Direction::Left);
        assert_eq!(proof.path[1].sibling, left);
        assert_eq!(proof.path[1].direction, Direction::Right);
    }

    #[test]
    fn test_append_matches_rebuild_for_every_size() {
        let hasher = Blake3Hasher;
        let all = leaves(70);
        let mut incremental = TreeStore::new();
        for (count, leaf) in all.iter().enumerate() {
            let appended_root = incremental.append_leaf(&hasher, *leaf).unwrap();

            let prefix = all[..=count].to_vec();
            let mut rebuilt = TreeStore::new();
            let rebuilt_root = rebuilt.build_from_leaves(&hasher, prefix.clone()).unwrap();

            assert_eq!(appended_root, rebuilt_root, "root differs at {} leaves", count + 1);
            assert_eq!(rebuilt_root, naive_root(&hasher, prefix));
            assert_eq!(incremental.depth(), rebuilt.depth());
            assert_eq!(incremental.levels, rebuilt.levels);
        }
    }

    #[test]
    fn test_every_path_replays_to_root() {
        let hasher = Blake3Hasher;
        for count in [1u32, 2, 3, 5, 8, 13, 33] {
            let l = leaves(count);
            let mut tree = TreeStore::new();
            let root = tree.build_from_leaves(&hasher, l.clone()).unwrap();
            for (position, leaf) in l.iter().enumerate() {
                let proof = tree.path_for(position as u64).unwrap();
                assert_eq!(proof.path.len(), tree.depth());
                assert_eq!(proof.compute_root(&hasher, leaf).unwrap(), root);
            }
            assert_matches!(
                tree.path_for(count as u64),
                Err(Error::IndexOutOfRange { .. })
            );
        }
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let hasher = Blake3Hasher;
        let mut tree = TreeStore::new();
        tree.build_from_leaves(&hasher, leaves(9)).unwrap();
        let root = tree.build_from_leaves(&hasher, leaves(2)).unwrap();
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.depth(), 1);
        assert_eq!(root, naive_root(&hasher, leaves(2)));
        assert_eq!(tree.leaf(1), Some(leaves(2)[1]));
        assert_eq!(tree.leaf(2), None);
    }
}
