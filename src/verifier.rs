//! Proof verification
//!
//! The verifier recomputes the session commitment from the published code
//! commitment and its own domain tag, replays the transcript from the
//! proof's commitments, and checks every opening. A structurally broken
//! proof is an error; a well-formed proof that fails a check is a
//! [`Verdict::Reject`] carrying the first failing [`Rejection`].

use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chips::cpu::{decode_opcode, opcode_allowed, Column, CpuChip, RowViolation, NIBBLE_MASK};
use crate::chips::lookup::{apply_bitwise, block_base, BLOCK_ROWS, LOOKUP_ROWS, OPERAND_RANGE};
use crate::chips::TableColumns;
use crate::config::ProtocolConfig;
use crate::field::{fr_from_u64, fr_to_u64};
use crate::hash::Hash256;
use crate::kzg::{Commitment, KzgError, Srs, VerifierKey};
use crate::proof::{LookupOpening, Proof};
use crate::session::{session_commitment, CodeCommitment, SessionBinding};
use crate::sumcheck::{self, SumcheckError};
use crate::trace::OpCode;
use crate::transcript::{derive_indices, row_seed, Transcript};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed proof: {0}")]
    Malformed(String),
    #[error("verifier setup: {0}")]
    Kzg(#[from] KzgError),
}

/// Why a well-formed proof was rejected
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("code hash does not match the published commitment")]
    CodeHashMismatch,
    #[error("domain tag does not match this session")]
    DomainTagMismatch,
    #[error("input hash does not match this session")]
    InputHashMismatch,
    #[error("session commitment does not match base commitment plus blinding")]
    SessionCommitmentMismatch,
    #[error("lookup table commitments differ from the verifier's table")]
    LookupTableMismatch,
    #[error("lookup openings present without lookup table commitments")]
    UnexpectedLookupOpenings,
    #[error("sum-check claimed sum is not zero")]
    SumcheckClaimedSumNonzero,
    #[error("sum-check round {round} is inconsistent")]
    SumcheckRoundFailed { round: usize },
    #[error("opcode sample {sample} is not at the derived index")]
    OpcodeIndexMismatch { sample: usize },
    #[error("opcode opening at row {index} failed its pairing check")]
    OpcodeOpeningPairingFailed { index: u64 },
    #[error("opcode at row {index} is not allowed")]
    OpcodeNotAllowed { index: u64 },
    #[error("output opening does not match the claimed final output")]
    OutputOpeningMismatch,
    #[error("final output {claimed} differs from expected {expected}")]
    OutputMismatch { expected: u64, claimed: u64 },
    #[error("lookup group {group} refers to a row outside the trace")]
    LookupRowOutOfRange { group: usize },
    #[error("lookup group {group} has a table index outside the table")]
    LookupIndexOutOfRange { group: usize },
    #[error("lookup group {group} opens a different table row")]
    LookupOpeningIndexMismatch { group: usize },
    #[error("lookup group {group} failed its pairing check")]
    LookupOpeningPairingFailed { group: usize },
    #[error("lookup group {group} has an operation tag outside its block")]
    LookupOpMismatch { group: usize },
    #[error("lookup group {group} operands do not match its table index")]
    LookupEntryInvalid { group: usize },
    #[error("lookup group {group} result is wrong")]
    LookupResultMismatch { group: usize },
    #[error("row sample {sample} is not at the derived index")]
    RowIndexMismatch { sample: usize },
    #[error("row {index}: {} opening failed its pairing check", .column.name())]
    RowOpeningPairingFailed { index: u64, column: Column },
    #[error("row {index}: halt flag is not boolean")]
    HaltFlagNotBoolean { index: u64 },
    #[error("row {index}: pc does not advance by one")]
    PcTransitionFailed { index: u64 },
    #[error("row {index}: {} is not a 64-bit value", .column.name())]
    OperandOutOfRange { index: u64, column: Column },
    #[error("row {index}: {opcode} result does not match its operands")]
    SemanticsFailed { index: u64, opcode: OpCode },
    #[error("row {index}: bitwise row has no lookup opening")]
    MissingLookupOpening { index: u64 },
    #[error("row {index}: lookup opening disagrees with the row")]
    LookupRowMismatch { index: u64 },
}

impl Rejection {
    /// Stable machine-readable reason
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::CodeHashMismatch => "code-hash-mismatch",
            Rejection::DomainTagMismatch => "domain-tag-mismatch",
            Rejection::InputHashMismatch => "input-hash-mismatch",
            Rejection::SessionCommitmentMismatch => "session-commitment-mismatch",
            Rejection::LookupTableMismatch => "lookup-table-mismatch",
            Rejection::UnexpectedLookupOpenings => "unexpected-lookup-openings",
            Rejection::SumcheckClaimedSumNonzero => "sumcheck-claimed-sum-nonzero",
            Rejection::SumcheckRoundFailed { .. } => "sumcheck-round-failed",
            Rejection::OpcodeIndexMismatch { .. } => "opcode-index-mismatch",
            Rejection::OpcodeOpeningPairingFailed { .. } => "opcode-opening-pairing-failed",
            Rejection::OpcodeNotAllowed { .. } => "opcode-not-allowed",
            Rejection::OutputOpeningMismatch => "output-opening-mismatch",
            Rejection::OutputMismatch { .. } => "output-mismatch",
            Rejection::LookupRowOutOfRange { .. } => "lookup-row-out-of-range",
            Rejection::LookupIndexOutOfRange { .. } => "lookup-index-out-of-range",
            Rejection::LookupOpeningIndexMismatch { .. } => "lookup-opening-index-mismatch",
            Rejection::LookupOpeningPairingFailed { .. } => "lookup-opening-pairing-failed",
            Rejection::LookupOpMismatch { .. } => "lookup-op-mismatch",
            Rejection::LookupEntryInvalid { .. } => "lookup-entry-invalid",
            Rejection::LookupResultMismatch { .. } => "lookup-result-mismatch",
            Rejection::RowIndexMismatch { .. } => "row-index-mismatch",
            Rejection::RowOpeningPairingFailed { .. } => "row-opening-pairing-failed",
            Rejection::HaltFlagNotBoolean { .. } => "halt-flag-not-boolean",
            Rejection::PcTransitionFailed { .. } => "pc-transition-failed",
            Rejection::OperandOutOfRange { .. } => "operand-out-of-range",
            Rejection::SemanticsFailed { opcode, .. } => match opcode {
                OpCode::Add => "add-semantics-failed",
                OpCode::Sub => "sub-semantics-failed",
                OpCode::Mul => "mul-semantics-failed",
                OpCode::And => "and-semantics-failed",
                OpCode::Or => "or-semantics-failed",
                OpCode::Push | OpCode::Halt => "semantics-failed",
            },
            Rejection::MissingLookupOpening { .. } => "missing-lookup-opening",
            Rejection::LookupRowMismatch { .. } => "lookup-row-mismatch",
        }
    }

    fn from_row(index: u64, violation: RowViolation) -> Self {
        match violation {
            RowViolation::HaltNotBoolean => Rejection::HaltFlagNotBoolean { index },
            RowViolation::PcTransition => Rejection::PcTransitionFailed { index },
            RowViolation::OpcodeNotAllowed => Rejection::OpcodeNotAllowed { index },
            RowViolation::OperandOutOfRange(column) => {
                Rejection::OperandOutOfRange { index, column }
            }
            RowViolation::Semantics(opcode) => Rejection::SemanticsFailed { index, opcode },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(Rejection),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Verdict::Accept => None,
            Verdict::Reject(reason) => Some(*reason),
        }
    }
}

/// State owned by one verification run
pub struct VerifierContext<'a> {
    pub config: &'a ProtocolConfig,
    pub vk: VerifierKey,
    pub lookup: Option<&'a TableColumns<Commitment>>,
    pub transcript: Transcript,
}

#[derive(Clone, Debug)]
pub struct Verifier {
    config: ProtocolConfig,
    srs: Arc<Srs>,
    lookup: Option<TableColumns<Commitment>>,
}

impl Verifier {
    /// The SRS must hold at least `blinding_degree + 1` powers
    pub fn new(config: ProtocolConfig, srs: Arc<Srs>) -> Result<Self, VerifyError> {
        let needed = config.blinding_powers();
        if srs.len() < needed {
            return Err(KzgError::DegreeTooLarge {
                len: needed,
                capacity: srs.len(),
            }
            .into());
        }
        Ok(Self {
            config,
            srs,
            lookup: None,
        })
    }

    /// Accept proofs that use the lookup table with these commitments
    pub fn with_lookup_commitments(mut self, commitments: TableColumns<Commitment>) -> Self {
        self.lookup = Some(commitments);
        self
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn verify(
        &self,
        code: &CodeCommitment,
        binding: &SessionBinding,
        proof: &Proof,
    ) -> Result<Verdict, VerifyError> {
        self.check_structure(proof)?;
        let expected_session = session_commitment(
            &self.srs,
            &code.base_commitment,
            &binding.domain_tag,
            self.config.blinding_degree,
        )?;
        let mut ctx = VerifierContext {
            config: &self.config,
            vk: self.srs.verifier_key(),
            lookup: self.lookup.as_ref(),
            transcript: Transcript::new(),
        };

        let verdict = match self.run(&mut ctx, code, binding, &expected_session, proof) {
            Ok(()) => {
                info!(rows = proof.trace_len, "proof accepted");
                Verdict::Accept
            }
            Err(reason) => {
                warn!(reason = reason.code(), "proof rejected: {reason}");
                Verdict::Reject(reason)
            }
        };
        Ok(verdict)
    }

    /// Shape checks that do not depend on any cryptographic check
    pub fn check_structure(&self, proof: &Proof) -> Result<(), VerifyError> {
        let malformed = |msg: String| Err(VerifyError::Malformed(msg));
        if proof.trace_len == 0 {
            return malformed("trace_len is zero".into());
        }
        if proof.trace_len.checked_next_power_of_two() != Some(proof.trace_pow2) {
            return malformed(format!(
                "trace_pow2 {} is not the padded size of trace_len {}",
                proof.trace_pow2, proof.trace_len
            ));
        }
        let rounds = proof.trace_pow2.trailing_zeros() as usize;
        if proof.sumcheck.rounds.len() != rounds {
            return malformed(format!(
                "expected {} sum-check rounds, found {}",
                rounds,
                proof.sumcheck.rounds.len()
            ));
        }
        if proof.opcode_openings.len() != self.config.opcode_samples {
            return malformed(format!(
                "expected {} opcode openings, found {}",
                self.config.opcode_samples,
                proof.opcode_openings.len()
            ));
        }
        let rows = if proof.trace_len >= 2 {
            self.config.row_samples
        } else {
            0
        };
        if proof.row_openings.len() != rows {
            return malformed(format!(
                "expected {} row openings, found {}",
                rows,
                proof.row_openings.len()
            ));
        }
        if proof.lookup_openings.len() as u64 > proof.trace_len {
            return malformed("more lookup groups than trace rows".into());
        }
        Ok(())
    }

    fn run(
        &self,
        ctx: &mut VerifierContext<'_>,
        code: &CodeCommitment,
        binding: &SessionBinding,
        expected_session: &Commitment,
        proof: &Proof,
    ) -> Result<(), Rejection> {
        check_binding(code, binding, expected_session, proof)?;
        check_table(ctx, proof)?;

        proof.statement().absorb_into(&mut ctx.transcript);
        sumcheck::verify(&proof.sumcheck, &mut ctx.transcript).map_err(|err| match err {
            SumcheckError::NonZeroClaim => Rejection::SumcheckClaimedSumNonzero,
            SumcheckError::RoundMismatch(round) => Rejection::SumcheckRoundFailed { round },
            SumcheckError::NotPowerOfTwo(_) => Rejection::SumcheckRoundFailed { round: 0 },
        })?;
        let seed = ctx.transcript.squeeze();
        debug!("transcript replayed");

        check_opcodes(ctx, proof, &seed)?;
        check_output(ctx, binding, proof)?;
        check_lookup_groups(ctx, proof)?;

        if proof.trace_len >= 2 {
            let indices = derive_indices(
                &row_seed(&seed),
                proof.trace_len - 1,
                ctx.config.row_samples,
            );
            self.check_row_openings(proof, &indices)?;
        }
        Ok(())
    }

    /// Row-pair stage: `indices` are the sampled row indices the openings must sit at
    pub fn check_row_openings(&self, proof: &Proof, indices: &[u64]) -> Result<(), Rejection> {
        let vk = self.srs.verifier_key();
        if indices.len() != proof.row_openings.len() {
            return Err(Rejection::RowIndexMismatch {
                sample: indices.len().min(proof.row_openings.len()),
            });
        }

        // Pairings are independent; failures are still reported in sample order.
        // Rows off their derived index are rejected below without being opened.
        let pairing_failures: Vec<Option<Column>> = proof
            .row_openings
            .par_iter()
            .zip(indices.par_iter())
            .map(|(row, expected)| {
                if row.index != *expected {
                    return None;
                }
                row.openings()
                    .into_iter()
                    .find(|(column, point, opening)| {
                        opening.index != *point
                            || !vk.verify_opening(proof.columns.get(*column), opening)
                    })
                    .map(|(column, _, _)| column)
            })
            .collect();

        for (sample, ((row, expected), failure)) in proof
            .row_openings
            .iter()
            .zip(indices)
            .zip(pairing_failures)
            .enumerate()
        {
            if row.index != *expected {
                return Err(Rejection::RowIndexMismatch { sample });
            }
            if let Some(column) = failure {
                return Err(Rejection::RowOpeningPairingFailed {
                    index: row.index,
                    column,
                });
            }
            let checked = CpuChip::check_row(&row.values())
                .map_err(|violation| Rejection::from_row(row.index, violation))?;
            if checked.opcode.is_bitwise() {
                let group = proof
                    .lookup_openings
                    .iter()
                    .find(|group| group.row == row.index)
                    .ok_or(Rejection::MissingLookupOpening { index: row.index })?;
                if !group_matches_row(group, checked.opcode, checked.x, checked.y, checked.z) {
                    return Err(Rejection::LookupRowMismatch { index: row.index });
                }
            }
        }
        Ok(())
    }
}

fn check_binding(
    code: &CodeCommitment,
    binding: &SessionBinding,
    expected_session: &Commitment,
    proof: &Proof,
) -> Result<(), Rejection> {
    if proof.code_hash != code.code_hash {
        return Err(Rejection::CodeHashMismatch);
    }
    if proof.domain_tag != binding.domain_tag {
        return Err(Rejection::DomainTagMismatch);
    }
    if proof.input_hash != binding.input_hash {
        return Err(Rejection::InputHashMismatch);
    }
    if proof.session_commitment != *expected_session {
        return Err(Rejection::SessionCommitmentMismatch);
    }
    Ok(())
}

fn check_table(ctx: &VerifierContext<'_>, proof: &Proof) -> Result<(), Rejection> {
    match (&proof.lookup_commitments, ctx.lookup) {
        (None, _) if !proof.lookup_openings.is_empty() => Err(Rejection::UnexpectedLookupOpenings),
        (None, _) => Ok(()),
        (Some(theirs), Some(ours)) if theirs == ours => Ok(()),
        (Some(_), _) => Err(Rejection::LookupTableMismatch),
    }
}

fn check_opcodes(ctx: &VerifierContext<'_>, proof: &Proof, seed: &Hash256) -> Result<(), Rejection> {
    let indices = derive_indices(seed, proof.trace_len, ctx.config.opcode_samples);
    for (sample, (opening, expected)) in proof.opcode_openings.iter().zip(&indices).enumerate() {
        if opening.index != *expected {
            return Err(Rejection::OpcodeIndexMismatch { sample });
        }
        if !ctx.vk.verify_opening(&proof.columns.opcode, opening) {
            return Err(Rejection::OpcodeOpeningPairingFailed {
                index: opening.index,
            });
        }
        if !opcode_allowed(&opening.value) {
            return Err(Rejection::OpcodeNotAllowed {
                index: opening.index,
            });
        }
    }
    Ok(())
}

fn check_output(
    ctx: &VerifierContext<'_>,
    binding: &SessionBinding,
    proof: &Proof,
) -> Result<(), Rejection> {
    let opening = &proof.output_opening;
    if opening.index != proof.trace_len - 1
        || opening.value != fr_from_u64(proof.final_output)
        || !ctx.vk.verify_opening(&proof.columns.z, opening)
    {
        return Err(Rejection::OutputOpeningMismatch);
    }
    match binding.expected_output {
        Some(expected) if expected != proof.final_output => Err(Rejection::OutputMismatch {
            expected,
            claimed: proof.final_output,
        }),
        _ => Ok(()),
    }
}

fn check_lookup_groups(ctx: &VerifierContext<'_>, proof: &Proof) -> Result<(), Rejection> {
    let Some(table) = ctx.lookup.filter(|_| proof.uses_lookup()) else {
        return Ok(());
    };
    for (group, lookup) in proof.lookup_openings.iter().enumerate() {
        if lookup.row >= proof.trace_len {
            return Err(Rejection::LookupRowOutOfRange { group });
        }
        if lookup.table_index >= LOOKUP_ROWS as u64 {
            return Err(Rejection::LookupIndexOutOfRange { group });
        }
        let openings = lookup.openings.as_array();
        if openings.iter().any(|o| o.index != lookup.table_index) {
            return Err(Rejection::LookupOpeningIndexMismatch { group });
        }
        let all_verify = table
            .as_array()
            .into_iter()
            .zip(openings)
            .all(|(commitment, opening)| ctx.vk.verify_opening(commitment, opening));
        if !all_verify {
            return Err(Rejection::LookupOpeningPairingFailed { group });
        }

        let op = decode_opcode(&lookup.openings.op.value)
            .filter(|op| op.is_bitwise())
            .ok_or(Rejection::LookupOpMismatch { group })?;
        let base = block_base(op).ok_or(Rejection::LookupOpMismatch { group })?;
        if !(base..base + BLOCK_ROWS).contains(&lookup.table_index) {
            return Err(Rejection::LookupOpMismatch { group });
        }

        let a = fr_to_u64(&lookup.openings.a.value).filter(|a| *a < OPERAND_RANGE);
        let b = fr_to_u64(&lookup.openings.b.value).filter(|b| *b < OPERAND_RANGE);
        let (Some(a), Some(b)) = (a, b) else {
            return Err(Rejection::LookupEntryInvalid { group });
        };
        if lookup.table_index != base + a * OPERAND_RANGE + b {
            return Err(Rejection::LookupEntryInvalid { group });
        }
        if apply_bitwise(op, a, b).map(fr_from_u64) != Some(lookup.openings.result.value) {
            return Err(Rejection::LookupResultMismatch { group });
        }
    }
    Ok(())
}

/// A lookup group justifies a row when it carries the row's opcode and low nibbles
fn group_matches_row(group: &LookupOpening, opcode: OpCode, x: u64, y: u64, z: u64) -> bool {
    let values = group.openings.map(|o| o.value);
    let expected = TableColumns {
        a: fr_from_u64(x & NIBBLE_MASK),
        b: fr_from_u64(y & NIBBLE_MASK),
        result: fr_from_u64(z & NIBBLE_MASK),
        op: fr_from_u64(opcode.as_u8() as u64),
    };
    values == expected
}
