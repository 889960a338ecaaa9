//! Proof generation
//!
//! Phases, in transcript order: encode and commit the columns, build the
//! session commitment, absorb the statement, open the lookup table for
//! every AND/OR row, run the transition sum-check, then sample opcode and
//! row-pair indices from the transcript and open them.

use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::chips::cpu::{encode_trace, CpuChip, EncodedTrace};
use crate::chips::lookup::table_index;
use crate::chips::LookupTable;
use crate::config::ProtocolConfig;
use crate::hash::Hash256;
use crate::kzg::{KzgError, Opening, Srs};
use crate::poly::Polynomial;
use crate::proof::{LookupOpening, Proof, RowOpening, Statement};
use crate::session::{session_commitment, CodeCommitment, SessionBinding};
use crate::sumcheck::{self, SumcheckError};
use crate::trace::ExecutionTrace;
use crate::transcript::{derive_indices, row_seed, Transcript};

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("cannot prove an empty trace")]
    EmptyTrace,
    #[error("trace uses AND/OR but no lookup table was supplied")]
    MissingLookupTable,
    #[error("commitment failed: {0}")]
    Kzg(#[from] KzgError),
    #[error("sum-check failed: {0}")]
    Sumcheck(#[from] SumcheckError),
}

/// State owned by one proving run
pub struct ProverContext<'a> {
    pub config: &'a ProtocolConfig,
    pub srs: &'a Srs,
    pub lookup: Option<&'a LookupTable>,
    pub transcript: Transcript,
}

/// Reusable prover: configuration, SRS and an optional lookup table
#[derive(Clone, Debug)]
pub struct Prover {
    config: ProtocolConfig,
    srs: Arc<Srs>,
    lookup: Option<Arc<LookupTable>>,
}

impl Prover {
    pub fn new(config: ProtocolConfig, srs: Arc<Srs>) -> Self {
        Self {
            config,
            srs,
            lookup: None,
        }
    }

    pub fn with_lookup_table(mut self, table: Arc<LookupTable>) -> Self {
        self.lookup = Some(table);
        self
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn srs(&self) -> &Srs {
        &self.srs
    }

    /// Prove that `trace` is a valid execution under `code` for this session
    pub fn prove(
        &self,
        code: &CodeCommitment,
        binding: &SessionBinding,
        trace: &ExecutionTrace,
    ) -> Result<Proof, ProverError> {
        if trace.is_empty() {
            return Err(ProverError::EmptyTrace);
        }
        let lookup = if trace.uses_bitwise() {
            Some(self.lookup.as_deref().ok_or(ProverError::MissingLookupTable)?)
        } else {
            None
        };
        let mut ctx = ProverContext {
            config: &self.config,
            srs: &self.srs,
            lookup,
            transcript: Transcript::new(),
        };

        let encoded = encode_trace(ctx.srs, trace)?;
        let trace_len = encoded.trace_len as u64;
        let trace_pow2 = encoded.padded_len() as u64;
        let session = session_commitment(
            ctx.srs,
            &code.base_commitment,
            &binding.domain_tag,
            ctx.config.blinding_degree,
        )?;
        let lookup_commitments = ctx.lookup.map(|table| *table.commitments());

        Statement {
            domain_tag: &binding.domain_tag,
            input_hash: &binding.input_hash,
            code_hash: &code.code_hash,
            session_commitment: &session,
            columns: &encoded.commitments,
            trace_len,
            trace_pow2,
            lookup_commitments: lookup_commitments.as_ref(),
        }
        .absorb_into(&mut ctx.transcript);

        let lookup_openings = open_lookups(&ctx, trace)?;

        let defects = CpuChip::defect_table(&encoded.evaluations, encoded.trace_len);
        let sumcheck = sumcheck::prove(defects, &mut ctx.transcript)?;
        debug!(rounds = sumcheck.rounds.len(), "sum-check done");

        let seed = ctx.transcript.squeeze();
        let opcode_openings = open_opcodes(&ctx, &encoded, &seed)?;
        let row_openings = open_rows(&ctx, &encoded, &seed)?;
        let output_opening = ctx.srs.open(&encoded.polynomials.z, trace_len - 1)?;

        info!(
            rows = trace_len,
            opcode_openings = opcode_openings.len(),
            row_openings = row_openings.len(),
            lookup_openings = lookup_openings.len(),
            "proof generated"
        );

        Ok(Proof {
            code_hash: code.code_hash,
            domain_tag: binding.domain_tag,
            input_hash: binding.input_hash,
            session_commitment: session,
            trace_len,
            trace_pow2,
            columns: encoded.commitments,
            lookup_commitments,
            sumcheck,
            opcode_openings,
            lookup_openings,
            row_openings,
            output_opening,
            final_output: trace.final_output(),
        })
    }
}

/// One lookup group per AND/OR row, in trace order
fn open_lookups(
    ctx: &ProverContext<'_>,
    trace: &ExecutionTrace,
) -> Result<Vec<LookupOpening>, ProverError> {
    let Some(table) = ctx.lookup else {
        return Ok(Vec::new());
    };
    trace
        .bitwise_rows()
        .filter_map(|(row, step)| {
            table_index(step.opcode, step.operand_x, step.operand_y).map(|index| (row, index))
        })
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(row, index)| -> Result<LookupOpening, ProverError> {
            Ok(LookupOpening {
                row: row as u64,
                table_index: index,
                openings: table.open(ctx.srs, index)?,
            })
        })
        .collect()
}

fn open_many(srs: &Srs, poly: &Polynomial, indices: &[u64]) -> Result<Vec<Opening>, KzgError> {
    indices.par_iter().map(|index| srs.open(poly, *index)).collect()
}

fn open_opcodes(
    ctx: &ProverContext<'_>,
    encoded: &EncodedTrace,
    seed: &Hash256,
) -> Result<Vec<Opening>, ProverError> {
    let indices = derive_indices(seed, encoded.trace_len as u64, ctx.config.opcode_samples);
    debug!(?indices, "opcode samples");
    Ok(open_many(ctx.srs, &encoded.polynomials.opcode, &indices)?)
}

/// Row pairs exist only for traces of two or more rows
fn open_rows(
    ctx: &ProverContext<'_>,
    encoded: &EncodedTrace,
    seed: &Hash256,
) -> Result<Vec<RowOpening>, ProverError> {
    if encoded.trace_len < 2 {
        return Ok(Vec::new());
    }
    let indices = derive_indices(
        &row_seed(seed),
        encoded.trace_len as u64 - 1,
        ctx.config.row_samples,
    );
    debug!(?indices, "row samples");
    let polys = &encoded.polynomials;
    indices
        .par_iter()
        .map(|&index| -> Result<RowOpening, ProverError> {
            Ok(RowOpening {
                index,
                pc: ctx.srs.open(&polys.pc, index)?,
                pc_next: ctx.srs.open(&polys.pc, index + 1)?,
                opcode: ctx.srs.open(&polys.opcode, index)?,
                x: ctx.srs.open(&polys.x, index)?,
                y: ctx.srs.open(&polys.y, index)?,
                z: ctx.srs.open(&polys.z, index)?,
                halt: ctx.srs.open(&polys.halt, index)?,
            })
        })
        .collect()
}
