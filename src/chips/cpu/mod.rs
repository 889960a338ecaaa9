//! CPU Chip implementation
//!
//! The CPU chip encodes the execution trace into six column polynomials and
//! owns the constraints checked against them.

mod air;
mod columns;
mod trace;

pub use air::{
    decode_opcode, opcode_allowed, semantics_hold, CheckedRow, CpuChip, OpenedRow, RowViolation,
    NIBBLE_MASK,
};
pub use columns::{Column, TraceColumns, CPU_NUM_COLUMNS};
pub use trace::{encode_trace, generate_cpu_trace, padded_len, EncodedTrace};
