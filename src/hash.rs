//! SHA-256 helpers and the 32-byte digest type

use byteorder::{BigEndian, ByteOrder};
use sha2::{Digest, Sha256};

/// A SHA-256 digest
pub type Hash256 = [u8; 32];

/// SHA-256 of a byte slice
pub fn sha256(data: &[u8]) -> Hash256 {
    sha256_concat(&[data])
}

/// SHA-256 over the concatenation of `parts`
pub fn sha256_concat(parts: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Hash of the public inputs: each value as 8 big-endian bytes, concatenated
pub fn hash_inputs(inputs: &[i64]) -> Hash256 {
    let mut bytes = vec![0u8; inputs.len() * 8];
    for (chunk, value) in bytes.chunks_exact_mut(8).zip(inputs) {
        BigEndian::write_i64(chunk, *value);
    }
    sha256(&bytes)
}

/// Domain tag derived from a human-readable session label
pub fn domain_tag(label: &str) -> Hash256 {
    sha256(label.as_bytes())
}

/// First eight bytes of a digest as a big-endian integer
pub fn digest_prefix_u64(digest: &Hash256) -> u64 {
    BigEndian::read_u64(&digest[..8])
}
