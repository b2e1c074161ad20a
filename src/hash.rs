//! Content-hash canonicalization.
//!
//! `hash(d) = LE_u64(SHA256(utf8(json_dumps(d, sort_keys=True)))[0:8])`.
//!
//! `serde_json`'s default `Map` is a `BTreeMap` (the `preserve_order`
//! feature is not enabled anywhere in this crate), so `serde_json::to_string`
//! already produces key-sorted output; no extra sorting step is needed here.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{FlattenError, FlattenResult};

/// Hash a JSON object's canonical (key-sorted) serialization, truncating
/// the SHA-256 digest to its first 8 bytes and reading them as a
/// little-endian `u64`. Hashing an empty object is a caller error.
pub fn hash_map(data: &Map<String, Value>) -> FlattenResult<u64> {
    if data.is_empty() {
        return Err(FlattenError::EmptyHash);
    }
    let canonical = serde_json::to_string(&Value::Object(data.clone()))?;
    let digest = Sha256::digest(canonical.as_bytes());
    let mut truncated = [0u8; 8];
    truncated.copy_from_slice(&digest[..8]);
    Ok(u64::from_le_bytes(truncated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn deterministic_regardless_of_key_order() {
        let a = map(json!({"a": 1, "b": 2}));
        let b = map(json!({"b": 2, "a": 1}));
        assert_eq!(hash_map(&a).unwrap(), hash_map(&b).unwrap());
    }

    #[test]
    fn different_content_hashes_differently() {
        let a = map(json!({"a": 1}));
        let b = map(json!({"a": 2}));
        assert_ne!(hash_map(&a).unwrap(), hash_map(&b).unwrap());
    }

    #[test]
    fn empty_object_is_an_error() {
        let empty = Map::new();
        assert!(hash_map(&empty).is_err());
    }
}
