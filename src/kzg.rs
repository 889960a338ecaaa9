//! KZG polynomial commitments over BN254.
//!
//! `commit` is a multi-scalar multiplication over the SRS powers, `open`
//! divides by `(X - z)` and commits to the quotient, and `verify` checks
//!
//! ```text
//! e(C - y·g, h) == e(W, h·s - z·h)
//! ```
//!
//! as a single `multi_pairing` against the identity.

use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, Group, VariableBaseMSM};
use ark_ff::One;
use ark_std::UniformRand;
use rand::RngCore;
use thiserror::Error;

use crate::field::fr_from_digest;
use crate::hash::sha256_concat;
use crate::poly::Polynomial;
use crate::{Curve, F, G1, G2};

type G1Projective = <Curve as Pairing>::G1;
type G2Projective = <Curve as Pairing>::G2;

const SRS_DOMAIN: &[u8] = b"zktrace-srs";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KzgError {
    #[error("polynomial has {len} coefficients but the SRS only holds {capacity} powers")]
    DegreeTooLarge { len: usize, capacity: usize },
}

/// A commitment to one polynomial
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Commitment(pub G1);

impl Default for Commitment {
    fn default() -> Self {
        Commitment(G1::zero())
    }
}

impl Commitment {
    /// Group sum of two commitments, i.e. the commitment to `P + Q`
    pub fn combine(&self, other: &Commitment) -> Commitment {
        Commitment((self.0.into_group() + other.0.into_group()).into_affine())
    }
}

/// Evidence that a committed polynomial evaluates to `value` at `index`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opening {
    pub index: u64,
    pub value: F,
    pub witness: G1,
}

/// Structured reference string `{g·s^i}` plus `{h, h·s}`
#[derive(Clone, Debug)]
pub struct Srs {
    g1_powers: Vec<G1>,
    h: G2,
    h_s: G2,
}

/// The part of the SRS a verifier needs for pairing checks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifierKey {
    pub g: G1,
    pub h: G2,
    pub h_s: G2,
}

impl Srs {
    /// SRS whose secret is derived from a public label.
    ///
    /// Anyone who knows the label knows `s`, so this is only fit for
    /// development. Two calls with the same label agree on every shared power.
    pub fn deterministic(label: &str, num_powers: usize) -> Self {
        let secret = fr_from_digest(&sha256_concat(&[SRS_DOMAIN, label.as_bytes()]));
        Self::from_secret(secret, num_powers)
    }

    pub fn random<R: RngCore + ?Sized>(rng: &mut R, num_powers: usize) -> Self {
        Self::from_secret(F::rand(rng), num_powers)
    }

    fn from_secret(secret: F, num_powers: usize) -> Self {
        let mut powers = Vec::with_capacity(num_powers);
        let mut current = G1Projective::generator();
        for _ in 0..num_powers {
            powers.push(current);
            current *= secret;
        }
        let h = G2Projective::generator();
        Self {
            g1_powers: G1Projective::normalize_batch(&powers),
            h: h.into_affine(),
            h_s: (h * secret).into_affine(),
        }
    }

    /// Number of G1 powers, i.e. the maximum number of coefficients committable
    pub fn len(&self) -> usize {
        self.g1_powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.g1_powers.is_empty()
    }

    pub fn verifier_key(&self) -> VerifierKey {
        VerifierKey {
            g: G1Projective::generator().into_affine(),
            h: self.h,
            h_s: self.h_s,
        }
    }

    /// `sum coeffs[i] · g·s^i`
    pub fn commit(&self, coeffs: &[F]) -> Result<Commitment, KzgError> {
        if coeffs.len() > self.g1_powers.len() {
            return Err(KzgError::DegreeTooLarge {
                len: coeffs.len(),
                capacity: self.g1_powers.len(),
            });
        }
        let point = G1Projective::msm_unchecked(&self.g1_powers[..coeffs.len()], coeffs);
        Ok(Commitment(point.into_affine()))
    }

    pub fn commit_poly(&self, poly: &Polynomial) -> Result<Commitment, KzgError> {
        self.commit(poly.coeffs())
    }

    /// Evaluate at `point` and commit to the quotient `(P(X) - P(z)) / (X - z)`
    pub fn open_at(&self, poly: &Polynomial, point: &F) -> Result<(F, G1), KzgError> {
        if poly.len() > self.g1_powers.len() {
            return Err(KzgError::DegreeTooLarge {
                len: poly.len(),
                capacity: self.g1_powers.len(),
            });
        }
        let (quotient, value) = poly.divide_by_linear(point);
        let witness = self.commit(quotient.coeffs())?;
        Ok((value, witness.0))
    }

    /// Open at the integer domain point `index`
    pub fn open(&self, poly: &Polynomial, index: u64) -> Result<Opening, KzgError> {
        let (value, witness) = self.open_at(poly, &F::from(index))?;
        Ok(Opening {
            index,
            value,
            witness,
        })
    }
}

impl VerifierKey {
    /// Check that `commitment` opens to `value` at `point`
    pub fn verify(&self, commitment: &Commitment, point: &F, value: &F, witness: &G1) -> bool {
        let lhs = commitment.0.into_group() - self.g.into_group() * value;
        let shifted = self.h_s.into_group() - self.h.into_group() * point;
        let neg_witness = -witness.into_group();
        Curve::multi_pairing(
            [lhs.into_affine(), neg_witness.into_affine()],
            [self.h, shifted.into_affine()],
        )
        .0
        .is_one()
    }

    /// Check an opening at an integer domain point
    pub fn verify_opening(&self, commitment: &Commitment, opening: &Opening) -> bool {
        self.verify(
            commitment,
            &F::from(opening.index),
            &opening.value,
            &opening.witness,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn fe(v: u64) -> F {
        F::from(v)
    }

    fn sample_poly() -> Polynomial {
        Polynomial::new(vec![fe(5), fe(0), fe(3), fe(1)])
    }

    #[test]
    fn test_open_verify_roundtrip() {
        let srs = Srs::deterministic("kzg-test", 8);
        let vk = srs.verifier_key();
        let poly = sample_poly();
        let c = srs.commit_poly(&poly).unwrap();
        for index in [0u64, 1, 7, 1000] {
            let opening = srs.open(&poly, index).unwrap();
            assert_eq!(opening.value, poly.evaluate(&fe(index)));
            assert!(vk.verify_opening(&c, &opening));
        }
    }

    #[test]
    fn test_wrong_value_rejected() {
        let srs = Srs::deterministic("kzg-test", 8);
        let vk = srs.verifier_key();
        let poly = sample_poly();
        let c = srs.commit_poly(&poly).unwrap();
        let mut opening = srs.open(&poly, 2).unwrap();
        opening.value += F::one();
        assert!(!vk.verify_opening(&c, &opening));
    }

    #[test]
    fn test_wrong_point_rejected() {
        let srs = Srs::deterministic("kzg-test", 8);
        let vk = srs.verifier_key();
        let poly = sample_poly();
        let c = srs.commit_poly(&poly).unwrap();
        let mut opening = srs.open(&poly, 2).unwrap();
        opening.index = 3;
        assert!(!vk.verify_opening(&c, &opening));
    }

    #[test]
    fn test_forged_witness_rejected() {
        let srs = Srs::deterministic("kzg-test", 8);
        let vk = srs.verifier_key();
        let poly = sample_poly();
        let c = srs.commit_poly(&poly).unwrap();
        let mut opening = srs.open(&poly, 2).unwrap();
        opening.witness = (opening.witness.into_group() + G1Projective::generator()).into_affine();
        assert!(!vk.verify_opening(&c, &opening));
        opening.witness = G1::zero();
        assert!(!vk.verify_opening(&c, &opening));
    }

    #[test]
    fn test_degree_too_large() {
        let srs = Srs::deterministic("kzg-test", 2);
        let err = srs.commit_poly(&sample_poly()).unwrap_err();
        assert_eq!(err, KzgError::DegreeTooLarge { len: 4, capacity: 2 });
        assert!(srs.open(&sample_poly(), 0).is_err());
    }

    #[test]
    fn test_empty_polynomial_opens_to_zero() {
        let srs = Srs::deterministic("kzg-test", 2);
        let vk = srs.verifier_key();
        let empty = Polynomial::zero();
        let c = srs.commit_poly(&empty).unwrap();
        assert_eq!(c, Commitment::default());
        let opening = srs.open(&empty, 5).unwrap();
        assert_eq!(opening.value, F::from(0u64));
        assert_eq!(opening.witness, G1::zero());
        assert!(vk.verify_opening(&c, &opening));
    }

    #[test]
    fn test_deterministic_srs_is_prefix_stable() {
        let small = Srs::deterministic("prefix", 4);
        let large = Srs::deterministic("prefix", 16);
        let poly = sample_poly();
        assert_eq!(small.commit_poly(&poly), large.commit_poly(&poly));
        assert_eq!(small.verifier_key(), large.verifier_key());
        assert_ne!(
            Srs::deterministic("other", 4).commit_poly(&poly),
            small.commit_poly(&poly)
        );
    }

    #[test]
    fn test_commitment_is_additive() {
        let srs = Srs::random(&mut ChaCha20Rng::seed_from_u64(7), 8);
        let p = sample_poly();
        let q = Polynomial::new(vec![fe(1), fe(2)]);
        let sum = Polynomial::new(vec![fe(6), fe(2), fe(3), fe(1)]);
        let combined = srs.commit_poly(&p).unwrap().combine(&srs.commit_poly(&q).unwrap());
        assert_eq!(combined, srs.commit_poly(&sum).unwrap());
    }
}
