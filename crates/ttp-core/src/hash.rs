//! Content hashing for pattern models and finding sets.
//!
//! Hashes cover the canonical JSON encoding of a value. Two runs over the
//! same document produce the same digest, which is how determinism of the
//! resolver and validator is checked.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// A 32-byte SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Compute the SHA-256 content hash of any serializable value.
pub fn content_hash<T: Serialize>(value: &T) -> Result<ContentHash> {
    let json = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(hasher.finalize().into())
}

/// Format a content hash as a hex string.
pub fn hash_hex(hash: &ContentHash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_hash() {
        let h1 = content_hash(&"ingress_acl").unwrap();
        let h2 = content_hash(&"ingress_acl").unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_inputs_different_hash() {
        let h1 = content_hash(&"vlan").unwrap();
        let h2 = content_hash(&"mpls").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn hash_hex_format() {
        let h = content_hash(&0x0800u32).unwrap();
        assert_eq!(hash_hex(&h).len(), 64);
    }
}
