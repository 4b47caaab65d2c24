//! Content hashing
//!
//! Cache keys for compiled programs. Inputs are hashed through their JSON form, so two inputs
//! hash alike exactly when they serialize alike.

use serde::Serialize;

/// 64-bit content hash of a serializable value (first eight bytes of its blake3 digest)
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> u64 {
    let bytes = match serde_json::to_vec(value) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(%err, "value cannot be serialized for hashing");
            Vec::new()
        }
    };
    digest_prefix(&bytes)
}

/// Order-sensitive combination of several hashes
pub fn combine(hashes: &[u64]) -> u64 {
    let bytes: Vec<u8> = hashes.iter().flat_map(|hash| hash.to_le_bytes()).collect();
    digest_prefix(&bytes)
}

fn digest_prefix(bytes: &[u8]) -> u64 {
    let digest = blake3::hash(bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = content_hash(&vec!["points", "normals"]);
        assert_eq!(a, content_hash(&vec!["points", "normals"]));
        assert_ne!(a, content_hash(&vec!["normals", "points"]));
    }

    #[test]
    fn test_combine_is_order_sensitive() {
        assert_eq!(combine(&[1, 2]), combine(&[1, 2]));
        assert_ne!(combine(&[1, 2]), combine(&[2, 1]));
    }
}
