//! Code commitment and per-session blinding.
//!
//! A program is published once as `(code_hash, base_commitment)` where the
//! base commitment is the KZG commitment to the code bytes, one coefficient
//! per byte. Each verification picks a fresh `domain_tag`; the proof must
//! carry `base_commitment + Commit(b_tag)` where `b_tag` is a public
//! polynomial derived from the tag, so a proof made for one tag does not
//! verify under another.

use tracing::debug;

use crate::field::fr_from_u64;
use crate::hash::{digest_prefix_u64, domain_tag, hash_inputs, sha256, sha256_concat, Hash256};
use crate::kzg::{Commitment, KzgError, Srs};
use crate::poly::Polynomial;

const BLIND_DOMAIN: &[u8] = b"code-blind";

/// Published commitment to one program version
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeCommitment {
    /// SHA-256 of the code bytes
    pub code_hash: Hash256,
    pub base_commitment: Commitment,
}

/// Verifier-chosen session parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionBinding {
    pub domain_tag: Hash256,
    /// Hash of the public inputs
    pub input_hash: Hash256,
    /// When set, the verifier requires this final output
    pub expected_output: Option<u64>,
}

impl SessionBinding {
    pub fn new(domain_tag: Hash256, input_hash: Hash256) -> Self {
        Self {
            domain_tag,
            input_hash,
            expected_output: None,
        }
    }

    /// Binding for a human-readable session label and a list of public inputs
    pub fn from_label(label: &str, inputs: &[i64]) -> Self {
        Self::new(domain_tag(label), hash_inputs(inputs))
    }

    pub fn with_expected_output(mut self, output: u64) -> Self {
        self.expected_output = Some(output);
        self
    }
}

/// One coefficient per code byte
pub fn code_polynomial(code: &[u8]) -> Polynomial {
    Polynomial::new(code.iter().map(|b| fr_from_u64(*b as u64)).collect())
}

/// Commit to a program's bytes. The SRS needs at least `code.len()` powers.
pub fn commit_code(srs: &Srs, code: &[u8]) -> Result<CodeCommitment, KzgError> {
    let base_commitment = srs.commit_poly(&code_polynomial(code))?;
    debug!(code_size = code.len(), "committed code");
    Ok(CodeCommitment {
        code_hash: sha256(code),
        base_commitment,
    })
}

/// Public blinding polynomial of `degree` for a domain tag.
///
/// Coefficient `i` is the first 8 bytes (big-endian) of
/// `SHA256("code-blind" || tag || i)` with `i` as one byte, so `degree`
/// is at most [`MAX_BLINDING_DEGREE`](crate::config::MAX_BLINDING_DEGREE).
pub fn blinding_polynomial(tag: &Hash256, degree: usize) -> Polynomial {
    Polynomial::from_fn(degree, |i| {
        let digest = sha256_concat(&[BLIND_DOMAIN, tag, &[i as u8]]);
        fr_from_u64(digest_prefix_u64(&digest))
    })
}

/// `base + Commit(blinding_polynomial(tag))`
pub fn session_commitment(
    srs: &Srs,
    base: &Commitment,
    tag: &Hash256,
    degree: usize,
) -> Result<Commitment, KzgError> {
    let blind = srs.commit_poly(&blinding_polynomial(tag, degree))?;
    Ok(base.combine(&blind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_hash_is_sha_of_bytes() {
        let srs = Srs::deterministic("session-test", 16);
        let cc = commit_code(&srs, b"\x00\x01\x02").unwrap();
        assert_eq!(cc.code_hash, sha256(b"\x00\x01\x02"));
        assert_eq!(cc.base_commitment, srs.commit_poly(&code_polynomial(b"\x00\x01\x02")).unwrap());
    }

    #[test]
    fn test_code_larger_than_srs_fails() {
        let srs = Srs::deterministic("session-test", 2);
        assert!(commit_code(&srs, b"abc").is_err());
    }

    #[test]
    fn test_blinding_polynomial_shape() {
        let tag = domain_tag("alpha");
        let b = blinding_polynomial(&tag, 8);
        assert_eq!(b.len(), 9);
        let first = sha256_concat(&[b"code-blind", &tag, &[0u8]]);
        assert_eq!(b.coeffs()[0], fr_from_u64(digest_prefix_u64(&first)));
        assert_eq!(blinding_polynomial(&tag, 8), b);
    }

    #[test]
    fn test_session_commitment_changes_with_tag() {
        let srs = Srs::deterministic("session-test", 16);
        let cc = commit_code(&srs, b"program").unwrap();
        let a = session_commitment(&srs, &cc.base_commitment, &domain_tag("a"), 8).unwrap();
        let b = session_commitment(&srs, &cc.base_commitment, &domain_tag("b"), 8).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, cc.base_commitment);
        assert_eq!(
            a,
            session_commitment(&srs, &cc.base_commitment, &domain_tag("a"), 8).unwrap()
        );
    }

    #[test]
    fn test_binding_from_label() {
        let binding = SessionBinding::from_label("sess", &[1, 2]).with_expected_output(3);
        assert_eq!(binding.domain_tag, domain_tag("sess"));
        assert_eq!(binding.input_hash, hash_inputs(&[1, 2]));
        assert_eq!(binding.expected_output, Some(3));
    }
}
