//! Conversions between integers, digests and field elements

use ark_ff::{BigInteger, PrimeField};
use ark_serialize::CanonicalSerialize;

use crate::hash::Hash256;
use crate::F;

/// Embed a 64-bit integer into the field
pub fn fr_from_u64(value: u64) -> F {
    F::from(value)
}

/// Recover a 64-bit integer from a field element.
///
/// Returns `None` when the canonical representative does not fit in 64 bits,
/// so values that wrapped around the modulus are never silently truncated.
pub fn fr_to_u64(value: &F) -> Option<u64> {
    let repr = value.into_bigint();
    if repr.0[1..].iter().all(|limb| *limb == 0) {
        Some(repr.0[0])
    } else {
        None
    }
}

/// Reduce a digest (big-endian) into the field
pub fn fr_from_digest(digest: &Hash256) -> F {
    F::from_be_bytes_mod_order(digest)
}

/// Canonical big-endian bytes of a field element
pub fn fr_to_be_bytes(value: &F) -> Vec<u8> {
    value.into_bigint().to_bytes_be()
}

/// Compressed canonical encoding of a field or group element.
///
/// Serializing an in-memory `Fr` or `G1` into a `Vec` cannot fail.
pub fn to_bytes<T: CanonicalSerialize>(value: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.compressed_size());
    value
        .serialize_compressed(&mut out)
        .expect("serializing into a Vec cannot fail");
    out
}
