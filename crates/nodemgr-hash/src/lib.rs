//! Node manager hash library.
//!
//! This crate provides domain-separated SHA-256 hashing for blocks, app
//! state and node identities.

use sha2::{Digest, Sha256};

pub const BLOCK_PREFIX: &[u8] = b"NODEMGR-BLOCK\0";
pub const APP_PREFIX: &[u8] = b"NODEMGR-APP\0";
pub const NODE_ID_PREFIX: &[u8] = b"NODEMGR-NODE-ID\0";
pub const VALIDATOR_PREFIX: &[u8] = b"NODEMGR-VALIDATOR\0";

/// Length in bytes of node ids and validator addresses.
pub const ADDRESS_LEN: usize = 20;

fn digest(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    digest(&[bytes])
}

/// SHA-256 over `prefix` followed by `bytes`; the prefix keeps digests of
/// different record kinds apart.
pub fn domain_hash(prefix: &[u8], bytes: &[u8]) -> [u8; 32] {
    digest(&[prefix, bytes])
}

/// Hash of a block header made of its height, parent hash and unix time.
pub fn block_hash(height: i64, parent: &[u8; 32], time_unix_nanos: i64) -> [u8; 32] {
    let mut bytes = Vec::with_capacity(8 + 32 + 8);
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(parent);
    bytes.extend_from_slice(&time_unix_nanos.to_be_bytes());
    domain_hash(BLOCK_PREFIX, &bytes)
}

/// App hash committed after executing the block at `height`.
pub fn app_hash(height: i64, block: &[u8; 32]) -> [u8; 32] {
    let mut bytes = Vec::with_capacity(8 + 32);
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(block);
    domain_hash(APP_PREFIX, &bytes)
}

pub fn node_id(public_key: &[u8]) -> [u8; ADDRESS_LEN] {
    truncate(domain_hash(NODE_ID_PREFIX, public_key))
}

pub fn validator_address(public_key: &[u8]) -> [u8; ADDRESS_LEN] {
    truncate(domain_hash(VALIDATOR_PREFIX, public_key))
}

/// Upper-case hex, the form hashes are reported in.
pub fn hash_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Lower-case hex, the form node ids take inside peer addresses.
pub fn id_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

fn truncate(digest: [u8; 32]) -> [u8; ADDRESS_LEN] {
    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&digest[..ADDRESS_LEN]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        let digest = sha256(b"hello");
        let expected = [
            0x2c, 0xf2, 0x4d, 0xba, 0x5f, 0xb0, 0xa3, 0x0e, 0x26, 0xe8, 0x3b, 0x2a, 0xc5, 0xb9,
            0xe2, 0x9e, 0x1b, 0x16, 0x1e, 0x5c, 0x1f, 0xa7, 0x42, 0x5e, 0x73, 0x04, 0x33, 0x62,
            0x93, 0x8b, 0x98, 0x24,
        ];
        assert_eq!(digest, expected);
    }

    #[test]
    fn domain_prefix_changes_digest() {
        assert_ne!(domain_hash(BLOCK_PREFIX, b"x"), domain_hash(APP_PREFIX, b"x"));
        assert_ne!(node_id(b"key"), validator_address(b"key"));
    }

    #[test]
    fn block_hash_depends_on_every_header_field() {
        let parent = [0u8; 32];
        let base = block_hash(1, &parent, 100);
        assert_ne!(base, block_hash(2, &parent, 100));
        assert_ne!(base, block_hash(1, &[1u8; 32], 100));
        assert_ne!(base, block_hash(1, &parent, 101));
        assert_eq!(base, block_hash(1, &parent, 100));
    }

    #[test]
    fn hex_forms_differ_only_in_case() {
        let id = node_id(b"key");
        assert_eq!(id_hex(&id).len(), ADDRESS_LEN * 2);
        assert_eq!(hash_hex(&id), id_hex(&id).to_uppercase());
    }
}
