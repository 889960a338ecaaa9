//! Proof object and the public statement both sides absorb

use crate::chips::cpu::{Column, OpenedRow};
use crate::chips::{TableColumns, TraceColumns};
use crate::hash::Hash256;
use crate::kzg::{Commitment, Opening};
use crate::sumcheck::SumcheckProof;
use crate::transcript::Transcript;

/// Four table openings justifying one AND/OR trace row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupOpening {
    /// Trace row this group justifies
    pub row: u64,
    /// Table row, `base + a·16 + b`
    pub table_index: u64,
    pub openings: TableColumns<Opening>,
}

/// Openings for the sampled row pair `(index, index + 1)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowOpening {
    pub index: u64,
    pub pc: Opening,
    /// pc at `index + 1`
    pub pc_next: Opening,
    pub opcode: Opening,
    pub x: Opening,
    pub y: Opening,
    pub z: Opening,
    pub halt: Opening,
}

impl RowOpening {
    /// Opened values, ready for the row checks
    pub fn values(&self) -> OpenedRow {
        OpenedRow {
            pc: self.pc.value,
            pc_next: self.pc_next.value,
            opcode: self.opcode.value,
            x: self.x.value,
            y: self.y.value,
            z: self.z.value,
            halt: self.halt.value,
        }
    }

    /// Every opening with the column it belongs to and the point it must be at.
    /// `index` must already be known to lie inside the trace.
    pub fn openings(&self) -> [(Column, u64, &Opening); 7] {
        let i = self.index;
        [
            (Column::Pc, i, &self.pc),
            (Column::Pc, i + 1, &self.pc_next),
            (Column::Opcode, i, &self.opcode),
            (Column::X, i, &self.x),
            (Column::Y, i, &self.y),
            (Column::Z, i, &self.z),
            (Column::Halt, i, &self.halt),
        ]
    }
}

/// A complete proof
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    pub code_hash: Hash256,
    pub domain_tag: Hash256,
    pub input_hash: Hash256,
    /// Base code commitment plus the session blinding commitment
    pub session_commitment: Commitment,
    pub trace_len: u64,
    pub trace_pow2: u64,
    pub columns: TraceColumns<Commitment>,
    /// Present only when the trace used AND/OR
    pub lookup_commitments: Option<TableColumns<Commitment>>,
    pub sumcheck: SumcheckProof,
    pub opcode_openings: Vec<Opening>,
    pub lookup_openings: Vec<LookupOpening>,
    pub row_openings: Vec<RowOpening>,
    /// Opening of `z` at the last trace row
    pub output_opening: Opening,
    pub final_output: u64,
}

impl Proof {
    pub fn uses_lookup(&self) -> bool {
        self.lookup_commitments.is_some()
    }

    pub fn statement(&self) -> Statement<'_> {
        Statement {
            domain_tag: &self.domain_tag,
            input_hash: &self.input_hash,
            code_hash: &self.code_hash,
            session_commitment: &self.session_commitment,
            columns: &self.columns,
            trace_len: self.trace_len,
            trace_pow2: self.trace_pow2,
            lookup_commitments: self.lookup_commitments.as_ref(),
        }
    }
}

/// Everything absorbed before the sum-check
#[derive(Clone, Copy, Debug)]
pub struct Statement<'a> {
    pub domain_tag: &'a Hash256,
    pub input_hash: &'a Hash256,
    pub code_hash: &'a Hash256,
    pub session_commitment: &'a Commitment,
    pub columns: &'a TraceColumns<Commitment>,
    pub trace_len: u64,
    pub trace_pow2: u64,
    pub lookup_commitments: Option<&'a TableColumns<Commitment>>,
}

impl Statement<'_> {
    pub fn absorb_into(&self, transcript: &mut Transcript) {
        transcript.absorb_hash(self.domain_tag);
        transcript.absorb_hash(self.input_hash);
        transcript.absorb_hash(self.code_hash);
        transcript.absorb_commitment(self.session_commitment);
        for commitment in self.columns.as_array() {
            transcript.absorb_commitment(commitment);
        }
        transcript.absorb_u64(self.trace_len);
        transcript.absorb_u64(self.trace_pow2);
        if let Some(lookup) = self.lookup_commitments {
            for commitment in lookup.as_array() {
                transcript.absorb_commitment(commitment);
            }
        }
    }
}
