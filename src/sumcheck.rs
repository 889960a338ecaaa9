//! Multilinear sum-check over the transition defect table.
//!
//! The table of `2^k` values is read as a multilinear function on the
//! boolean hypercube, lowest variable first. Each round sends the linear
//! round polynomial `g(t) = g0 + slope·t` where `g0` sums the even entries
//! and `g0 + slope` the odd ones, then folds adjacent pairs with the
//! round challenge `r`: `f'[i] = f[2i](1 - r) + f[2i+1]r`.

use ark_ff::{One, Zero};
use thiserror::Error;
use tracing::trace;

use crate::transcript::Transcript;
use crate::F;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SumcheckRound {
    /// g(0)
    pub g0: F,
    /// g(1) - g(0)
    pub slope: F,
}

impl SumcheckRound {
    pub fn g1(&self) -> F {
        self.g0 + self.slope
    }

    pub fn evaluate(&self, point: &F) -> F {
        self.g0 + self.slope * point
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SumcheckProof {
    pub claimed_sum: F,
    pub rounds: Vec<SumcheckRound>,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SumcheckError {
    #[error("table length {0} is not a power of two")]
    NotPowerOfTwo(usize),
    #[error("claimed sum is not zero")]
    NonZeroClaim,
    #[error("round {0}: g(0) + g(1) does not match the running claim")]
    RoundMismatch(usize),
}

/// Verifier's view after replaying every round
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumcheckOutcome {
    pub challenges: Vec<F>,
    /// Claimed value of the multilinear extension at `challenges`.
    ///
    /// Not checked against the column commitments: those are univariate.
    pub final_claim: F,
}

/// Number of rounds for a table of `len` entries
pub fn num_rounds(len: usize) -> usize {
    len.trailing_zeros() as usize
}

/// Run the prover side, absorbing the claim and every round into `transcript`
pub fn prove(mut table: Vec<F>, transcript: &mut Transcript) -> Result<SumcheckProof, SumcheckError> {
    if !table.len().is_power_of_two() {
        return Err(SumcheckError::NotPowerOfTwo(table.len()));
    }
    let claimed_sum: F = table.iter().sum();
    transcript.absorb_field(&claimed_sum);

    let mut rounds = Vec::with_capacity(num_rounds(table.len()));
    while table.len() > 1 {
        let (mut g0, mut g1) = (F::zero(), F::zero());
        for pair in table.chunks_exact(2) {
            g0 += pair[0];
            g1 += pair[1];
        }
        transcript.absorb_field(&g0);
        transcript.absorb_field(&g1);
        let r = transcript.challenge();
        transcript.absorb_field(&r);

        let one_minus_r = F::one() - r;
        table = table
            .chunks_exact(2)
            .map(|pair| pair[0] * one_minus_r + pair[1] * r)
            .collect();
        trace!(round = rounds.len(), remaining = table.len(), "sum-check round");
        rounds.push(SumcheckRound { g0, slope: g1 - g0 });
    }

    Ok(SumcheckProof {
        claimed_sum,
        rounds,
    })
}

/// Replay the rounds, requiring a zero claim before anything is absorbed
pub fn verify(
    proof: &SumcheckProof,
    transcript: &mut Transcript,
) -> Result<SumcheckOutcome, SumcheckError> {
    if !proof.claimed_sum.is_zero() {
        return Err(SumcheckError::NonZeroClaim);
    }
    transcript.absorb_field(&proof.claimed_sum);

    let mut claim = proof.claimed_sum;
    let mut challenges = Vec::with_capacity(proof.rounds.len());
    for (i, round) in proof.rounds.iter().enumerate() {
        let g1 = round.g1();
        if round.g0 + g1 != claim {
            return Err(SumcheckError::RoundMismatch(i));
        }
        transcript.absorb_field(&round.g0);
        transcript.absorb_field(&g1);
        let r = transcript.challenge();
        transcript.absorb_field(&r);
        claim = round.evaluate(&r);
        challenges.push(r);
    }

    Ok(SumcheckOutcome {
        challenges,
        final_claim: claim,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(v: u64) -> F {
        F::from(v)
    }

    /// Multilinear extension of `table` at `point`, lowest variable first
    fn mle(table: &[F], point: &[F]) -> F {
        let mut current = table.to_vec();
        for r in point {
            current = current
                .chunks_exact(2)
                .map(|p| p[0] * (F::one() - r) + p[1] * r)
                .collect();
        }
        current[0]
    }

    #[test]
    fn test_zero_table_roundtrip() {
        let table = vec![F::zero(); 8];
        let mut pt = Transcript::new();
        let proof = prove(table.clone(), &mut pt).unwrap();
        assert_eq!(proof.rounds.len(), 3);

        let mut vt = Transcript::new();
        let outcome = verify(&proof, &mut vt).unwrap();
        assert_eq!(outcome.challenges.len(), 3);
        assert_eq!(outcome.final_claim, mle(&table, &outcome.challenges));
        assert_eq!(pt.squeeze(), vt.squeeze());
    }

    #[test]
    fn test_cancelling_entries_roundtrip() {
        // Nonzero entries whose sum is zero still yield a consistent proof
        let table = vec![fe(5), -fe(5), fe(0), fe(0)];
        let proof = prove(table.clone(), &mut Transcript::new()).unwrap();
        assert!(proof.claimed_sum.is_zero());
        let outcome = verify(&proof, &mut Transcript::new()).unwrap();
        assert_eq!(outcome.final_claim, mle(&table, &outcome.challenges));
    }

    #[test]
    fn test_nonzero_claim_rejected_first() {
        let proof = prove(vec![fe(1), fe(0)], &mut Transcript::new()).unwrap();
        assert_eq!(proof.claimed_sum, fe(1));
        let mut vt = Transcript::new();
        assert_eq!(verify(&proof, &mut vt), Err(SumcheckError::NonZeroClaim));
        assert!(vt.is_empty());
    }

    #[test]
    fn test_tampered_round_rejected() {
        let table = vec![fe(3), fe(0), -fe(3), fe(0)];
        let mut proof = prove(table, &mut Transcript::new()).unwrap();
        proof.rounds[1].g0 += F::one();
        assert_eq!(
            verify(&proof, &mut Transcript::new()),
            Err(SumcheckError::RoundMismatch(1))
        );
    }

    #[test]
    fn test_single_entry_has_no_rounds() {
        let proof = prove(vec![F::zero()], &mut Transcript::new()).unwrap();
        assert!(proof.rounds.is_empty());
        assert_eq!(num_rounds(1), 0);
        assert_eq!(num_rounds(256), 8);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert_eq!(
            prove(vec![F::zero(); 3], &mut Transcript::new()),
            Err(SumcheckError::NotPowerOfTwo(3))
        );
    }
}
