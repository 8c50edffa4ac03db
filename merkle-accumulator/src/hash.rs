//! Digest type and the hashing seam between tree logic and the compression
//! primitive.

use std::fmt;

use bincode::{Decode, Encode};

use crate::Error;

/// Width in bytes of every digest (four 64-bit limbs).
pub const DIGEST_SIZE: usize = 32;

/// Domain separation tag prepended to leaf pre-images.
pub(crate) const LEAF_DOMAIN_TAG: u8 = 0x00;
/// Domain separation tag prepended to internal node pre-images.
pub(crate) const INTERNAL_DOMAIN_TAG: u8 = 0x01;

/// A fixed-size tree node value. Leaves, internal nodes and the root all
/// share this type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; DIGEST_SIZE]) -> Self {
        Digest(bytes)
    }

    /// Build a digest from four little-endian 64-bit limbs, least
    /// significant limb first.
    pub fn from_limbs(limbs: [u64; 4]) -> Self {
        let mut bytes = [0u8; DIGEST_SIZE];
        for (chunk, limb) in bytes.chunks_exact_mut(8).zip(limbs) {
            chunk.copy_from_slice(&limb.to_le_bytes());
        }
        Digest(bytes)
    }

    /// Split into four little-endian 64-bit limbs.
    pub fn to_limbs(&self) -> [u64; 4] {
        let mut limbs = [0u64; 4];
        for (limb, chunk) in limbs.iter_mut().zip(self.0.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *limb = u64::from_le_bytes(buf);
        }
        limbs
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; DIGEST_SIZE] {
        self.0
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; DIGEST_SIZE] = bytes.try_into().map_err(|_| Error::InvalidEncoding {
            expected: DIGEST_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Digest(array))
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Digest(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(self.0))
    }
}

/// The compression primitive the tree is built with.
///
/// Both functions must be pure and deterministic. Swapping implementations
/// changes every digest, so a store remembers the [`id`](Self::id) it was
/// built with and refuses to open under a different one.
pub trait MerkleHasher: Send + Sync {
    /// Stable identifier persisted alongside the leaves.
    fn id(&self) -> &'static str;

    /// `H1`: one input to one digest.
    fn hash_one(&self, input: &Digest) -> Digest;

    /// `H`: two inputs to one digest.
    fn hash_two(&self, left: &Digest, right: &Digest) -> Digest;

    /// Leaf digest of a W-byte value. Fails with `InvalidEncoding` on any
    /// other width.
    fn leaf_digest(&self, value: &[u8]) -> Result<Digest, Error> {
        let element = Digest::try_from(value)?;
        Ok(self.hash_one(&element))
    }

    /// Parent digest of two children.
    fn combine(&self, left: &Digest, right: &Digest) -> Digest {
        self.hash_two(left, right)
    }
}

/// Blake3 with leaf/internal domain separation:
///
/// - leaf: `blake3(0x00 || value)`
/// - internal: `blake3(0x01 || left || right)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl MerkleHasher for Blake3Hasher {
    fn id(&self) -> &'static str {
        "blake3-v1"
    }

    fn hash_one(&self, input: &Digest) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[LEAF_DOMAIN_TAG]);
        hasher.update(input.as_bytes());
        Digest(*hasher.finalize().as_bytes())
    }

    fn hash_two(&self, left: &Digest, right: &Digest) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[INTERNAL_DOMAIN_TAG]);
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        Digest(*hasher.finalize().as_bytes())
    }
}

impl<H: MerkleHasher + ?Sized> MerkleHasher for &H {
    fn id(&self) -> &'static str {
        (**self).id()
    }

    fn hash_one(&self, input: &Digest) -> Digest {
        (**self).hash_one(input)
    }

    fn hash_two(&self, left: &Digest, right: &Digest) -> Digest {
        (**self).hash_two(left, right)
    }
}
