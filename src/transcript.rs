//! Fiat–Shamir transcript.
//!
//! The transcript is the raw concatenation of everything absorbed. A
//! challenge is `SHA256(state)` reduced into the field, so prover and
//! verifier agree on a challenge exactly when they absorbed the same bytes
//! in the same order.

use crate::field::{fr_from_digest, to_bytes};
use crate::hash::{digest_prefix_u64, sha256, sha256_concat, Hash256};
use crate::kzg::Commitment;
use crate::F;

/// Byte appended to the sampling seed before deriving row indices
pub const ROW_SEED_TAG: u8 = 0x52;

#[derive(Clone, Debug, Default)]
pub struct Transcript {
    state: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb_bytes(&mut self, bytes: &[u8]) {
        self.state.extend_from_slice(bytes);
    }

    pub fn absorb_hash(&mut self, hash: &Hash256) {
        self.absorb_bytes(hash);
    }

    pub fn absorb_field(&mut self, value: &F) {
        self.state.extend(to_bytes(value));
    }

    pub fn absorb_commitment(&mut self, commitment: &Commitment) {
        self.state.extend(to_bytes(&commitment.0));
    }

    pub fn absorb_u64(&mut self, value: u64) {
        self.absorb_bytes(&value.to_be_bytes());
    }

    /// Digest of everything absorbed so far
    pub fn squeeze(&self) -> Hash256 {
        sha256(&self.state)
    }

    /// Field challenge bound to everything absorbed so far
    pub fn challenge(&self) -> F {
        fr_from_digest(&self.squeeze())
    }

    /// Absorbed length in bytes
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// Derive `count` indices in `0..domain` from a seed by hash chaining.
///
/// Indices may repeat. An empty domain yields no indices.
pub fn derive_indices(seed: &Hash256, domain: u64, count: usize) -> Vec<u64> {
    if domain == 0 {
        return Vec::new();
    }
    let mut current = *seed;
    (0..count as u32)
        .map(|counter| {
            current = sha256_concat(&[&current, &counter.to_be_bytes()]);
            digest_prefix_u64(&current) % domain
        })
        .collect()
}

/// Seed for row-pair sampling, kept independent of the opcode sample chain
pub fn row_seed(seed: &Hash256) -> Hash256 {
    sha256_concat(&[seed, &[ROW_SEED_TAG]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_challenge_depends_on_order() {
        let mut a = Transcript::new();
        a.absorb_u64(1);
        a.absorb_u64(2);
        let mut b = Transcript::new();
        b.absorb_u64(2);
        b.absorb_u64(1);
        assert_ne!(a.challenge(), b.challenge());
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_challenge_does_not_mutate() {
        let mut t = Transcript::new();
        t.absorb_bytes(b"state");
        assert_eq!(t.challenge(), t.challenge());
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn test_field_and_group_encodings_are_fixed_width() {
        let mut t = Transcript::new();
        t.absorb_field(&F::from(3u64));
        t.absorb_commitment(&Commitment::default());
        assert_eq!(t.len(), 64);
    }

    #[test]
    fn test_indices_follow_hash_chain() {
        let seed = sha256(b"seed");
        let first = sha256_concat(&[&seed, &0u32.to_be_bytes()]);
        let second = sha256_concat(&[&first, &1u32.to_be_bytes()]);
        let indices = derive_indices(&seed, 1_000, 2);
        assert_eq!(indices[0], digest_prefix_u64(&first) % 1_000);
        assert_eq!(indices[1], digest_prefix_u64(&second) % 1_000);
    }

    #[test]
    fn test_empty_domain() {
        assert!(derive_indices(&[0u8; 32], 0, 4).is_empty());
        assert_eq!(derive_indices(&[0u8; 32], 1, 3), vec![0, 0, 0]);
    }

    #[test]
    fn test_row_seed_differs_from_seed() {
        let seed = sha256(b"seed");
        assert_ne!(row_seed(&seed), seed);
        assert_eq!(row_seed(&seed), sha256_concat(&[&seed, b"R"]));
    }

    proptest! {
        #[test]
        fn prop_identical_absorption_gives_identical_challenges(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..40), 0..8)
        ) {
            let mut a = Transcript::new();
            let mut b = Transcript::new();
            for chunk in &chunks {
                a.absorb_bytes(chunk);
                b.absorb_bytes(chunk);
            }
            prop_assert_eq!(a.challenge(), b.challenge());
        }

        #[test]
        fn prop_indices_stay_in_domain(seed in any::<[u8; 32]>(), domain in 1u64..10_000, count in 0usize..16) {
            let indices = derive_indices(&seed, domain, count);
            prop_assert_eq!(indices.len(), count);
            prop_assert!(indices.iter().all(|i| *i < domain));
        }
    }
}
