//! BLAKE3 hashing implementation
//!
//! Block hashes and proof-of-work candidates are both BLAKE3 digests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte hash output, hex encoded on the wire
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(#[serde(with = "hex::serde")] pub [u8; 32]);

impl Hash {
    /// All-zero hash, used as the genesis previous-hash sentinel
    pub const fn zero() -> Self {
        Hash([0u8; 32])
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Number of leading zero hex digits (nibbles)
    pub fn leading_zero_digits(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

/// Hash arbitrary bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> Hash {
    let hash = blake3::hash(data);
    Hash(*hash.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"hello world";
        assert_eq!(hash_bytes(data), hash_bytes(data));
    }

    #[test]
    fn test_hash_different_inputs() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn test_serializes_as_hex_string() {
        let hash = hash_bytes(b"wire");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));

        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_leading_zero_digits() {
        let mut bytes = [0xFFu8; 32];
        assert_eq!(Hash(bytes).leading_zero_digits(), 0);

        bytes[0] = 0x0F;
        assert_eq!(Hash(bytes).leading_zero_digits(), 1);

        bytes[0] = 0x00;
        bytes[1] = 0x01;
        assert_eq!(Hash(bytes).leading_zero_digits(), 3);

        assert_eq!(Hash::zero().leading_zero_digits(), 64);
    }
}
