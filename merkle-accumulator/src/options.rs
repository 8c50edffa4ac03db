//! Accumulator configuration.

use serde::{Deserialize, Serialize};

use crate::{hash::DIGEST_SIZE, Error};

/// How a caller-supplied value becomes the W-byte pre-image of its leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafEncoding {
    /// The value must already be exactly W bytes.
    #[default]
    Exact,
    /// Values shorter than W are right-padded with zero bytes. Longer
    /// values are still rejected.
    ZeroPadded,
}

impl LeafEncoding {
    /// Encode `value` into a W-byte buffer.
    pub fn encode(self, value: &[u8]) -> Result<[u8; DIGEST_SIZE], Error> {
        let fits = match self {
            LeafEncoding::Exact => value.len() == DIGEST_SIZE,
            LeafEncoding::ZeroPadded => value.len() <= DIGEST_SIZE,
        };
        if !fits {
            return Err(Error::InvalidEncoding {
                expected: DIGEST_SIZE,
                actual: value.len(),
            });
        }
        let mut buf = [0u8; DIGEST_SIZE];
        buf[..value.len()].copy_from_slice(value);
        Ok(buf)
    }
}

/// Options for [`Accumulator::open`](crate::Accumulator::open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorOptions {
    pub leaf_encoding: LeafEncoding,
    /// Cross-check every index entry against the persisted leaves when
    /// opening a non-empty store. Costs one full scan of the index.
    pub verify_on_open: bool,
}

impl Default for AccumulatorOptions {
    fn default() -> Self {
        Self {
            leaf_encoding: LeafEncoding::Exact,
            verify_on_open: true,
        }
    }
}

impl AccumulatorOptions {
    pub fn with_leaf_encoding(mut self, leaf_encoding: LeafEncoding) -> Self {
        self.leaf_encoding = leaf_encoding;
        self
    }

    pub fn with_verify_on_open(mut self, verify_on_open: bool) -> Self {
        self.verify_on_open = verify_on_open;
        self
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_exact_encoding() {
        assert_eq!(LeafEncoding::Exact.encode(&[3u8; 32]).unwrap(), [3u8; 32]);
        assert_matches!(
            LeafEncoding::Exact.encode(b"value1"),
            Err(Error::InvalidEncoding {
                expected: 32,
                actual: 6
            })
        );
    }

    #[test]
    fn test_zero_padded_encoding() {
        let encoded = LeafEncoding::ZeroPadded.encode(b"value1").unwrap();
        assert_eq!(&encoded[..6], b"value1");
        assert!(encoded[6..].iter().all(|b| *b == 0));
        assert_eq!(LeafEncoding::ZeroPadded.encode(&[]).unwrap(), [0u8; 32]);
        assert_matches!(
            LeafEncoding::ZeroPadded.encode(&[1u8; 40]),
            Err(Error::InvalidEncoding { actual: 40, .. })
        );
    }
}
