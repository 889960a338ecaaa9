//! CPU trace generation from execution trace

use ark_ff::Zero;
use tracing::debug;

use super::columns::TraceColumns;
use crate::kzg::{Commitment, KzgError, Srs};
use crate::poly::Polynomial;
use crate::trace::ExecutionTrace;
use crate::F;

/// Size of the evaluation domain for a trace of `len` rows
pub fn padded_len(len: usize) -> usize {
    len.next_power_of_two()
}

/// Column evaluations over `0..pow2`; rows past the trace are zero
pub fn generate_cpu_trace(trace: &ExecutionTrace) -> TraceColumns<Vec<F>> {
    let trace_len = padded_len(trace.len());
    let mut columns = TraceColumns::from_fn(|_| vec![F::zero(); trace_len]);

    for (i, row) in trace.rows.iter().enumerate() {
        let shadow = row.to_field_row();
        columns.pc[i] = shadow.pc;
        columns.opcode[i] = shadow.opcode;
        columns.x[i] = shadow.x;
        columns.y[i] = shadow.y;
        columns.z[i] = shadow.z;
        columns.halt[i] = shadow.halt;
    }

    columns
}

/// Interpolated column polynomials and their commitments
#[derive(Clone, Debug)]
pub struct EncodedTrace {
    pub evaluations: TraceColumns<Vec<F>>,
    pub polynomials: TraceColumns<Polynomial>,
    pub commitments: TraceColumns<Commitment>,
    pub trace_len: usize,
}

impl EncodedTrace {
    pub fn padded_len(&self) -> usize {
        self.evaluations.pc.len()
    }
}

/// Encode every column and commit to it, one column per rayon task
pub fn encode_trace(srs: &Srs, trace: &ExecutionTrace) -> Result<EncodedTrace, KzgError> {
    let evaluations = generate_cpu_trace(trace);
    let polynomials = evaluations
        .clone()
        .par_try_map(|values| Ok::<_, KzgError>(Polynomial::interpolate_range(&values)))?;
    let commitments = polynomials.clone().par_try_map(|poly| srs.commit_poly(&poly))?;
    debug!(
        rows = trace.len(),
        padded = evaluations.pc.len(),
        "committed trace columns"
    );
    Ok(EncodedTrace {
        evaluations,
        polynomials,
        commitments,
        trace_len: trace.len(),
    })
}
