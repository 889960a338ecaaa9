//! CPU constraints: the pc transition defect summed by the sum-check, and the
//! per-row checks applied to sampled openings

use ark_ff::{One, Zero};
use thiserror::Error;

use super::columns::{Column, TraceColumns};
use crate::field::fr_to_u64;
use crate::trace::OpCode;
use crate::F;

/// Low-nibble mask used by the bitwise opcodes
pub const NIBBLE_MASK: u64 = 0xF;

/// CPU Chip
pub struct CpuChip;

/// Values opened at a sampled row pair `(i, i + 1)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenedRow {
    pub pc: F,
    pub pc_next: F,
    pub opcode: F,
    pub x: F,
    pub y: F,
    pub z: F,
    pub halt: F,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RowViolation {
    #[error("halt flag is not 0 or 1")]
    HaltNotBoolean,
    #[error("pc does not advance by one on a non-halt row")]
    PcTransition,
    #[error("opcode is not in the allow-list")]
    OpcodeNotAllowed,
    #[error("{} is not a 64-bit value", .0.name())]
    OperandOutOfRange(Column),
    #[error("{0} result does not match its operands")]
    Semantics(OpCode),
}

/// A row that passed [`CpuChip::check_row`], decoded to integers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckedRow {
    pub opcode: OpCode,
    pub x: u64,
    pub y: u64,
    pub z: u64,
}

impl CpuChip {
    /// `(pc_next - (pc + 1)) * (1 - halt)`
    pub fn transition_defect(pc: &F, pc_next: &F, halt: &F) -> F {
        (*pc_next - (*pc + F::one())) * (F::one() - halt)
    }

    /// Defect per row over the padded domain.
    ///
    /// Entry `i` holds the defect between rows `i` and `i + 1` for
    /// `i < trace_len - 1`; every other entry, including all padding, is zero.
    pub fn defect_table(columns: &TraceColumns<Vec<F>>, trace_len: usize) -> Vec<F> {
        let pow2 = columns.pc.len();
        let mut table = vec![F::zero(); pow2];
        for i in 0..trace_len.saturating_sub(1) {
            table[i] =
                Self::transition_defect(&columns.pc[i], &columns.pc[i + 1], &columns.halt[i]);
        }
        table
    }

    /// Check one sampled row: halt flag, pc transition, opcode, operand
    /// ranges and the opcode's arithmetic identity, in that order
    pub fn check_row(row: &OpenedRow) -> Result<CheckedRow, RowViolation> {
        let halted = if row.halt.is_zero() {
            false
        } else if row.halt.is_one() {
            true
        } else {
            return Err(RowViolation::HaltNotBoolean);
        };
        if !halted && row.pc_next != row.pc + F::one() {
            return Err(RowViolation::PcTransition);
        }

        let opcode = decode_opcode(&row.opcode).ok_or(RowViolation::OpcodeNotAllowed)?;
        let x = fr_to_u64(&row.x).ok_or(RowViolation::OperandOutOfRange(Column::X))?;
        let y = fr_to_u64(&row.y).ok_or(RowViolation::OperandOutOfRange(Column::Y))?;
        let z = fr_to_u64(&row.z).ok_or(RowViolation::OperandOutOfRange(Column::Z))?;

        if !semantics_hold(opcode, x, y, z) {
            return Err(RowViolation::Semantics(opcode));
        }
        Ok(CheckedRow { opcode, x, y, z })
    }
}

/// Decode an opened opcode value, `None` unless it is one of the modeled opcodes
pub fn decode_opcode(value: &F) -> Option<OpCode> {
    fr_to_u64(value).and_then(OpCode::from_u64)
}

pub fn opcode_allowed(value: &F) -> bool {
    decode_opcode(value).is_some()
}

/// Arithmetic identity of each opcode, with 64-bit wrapping.
///
/// `SUB` is `x - y` with `x` the left operand. `AND`/`OR` only constrain
/// the low nibble, which is the part the lookup table covers.
pub fn semantics_hold(opcode: OpCode, x: u64, y: u64, z: u64) -> bool {
    match opcode {
        OpCode::Add => z == x.wrapping_add(y),
        OpCode::Sub => z == x.wrapping_sub(y),
        OpCode::Mul => z == x.wrapping_mul(y),
        OpCode::And => z & NIBBLE_MASK == (x & NIBBLE_MASK) & (y & NIBBLE_MASK),
        OpCode::Or => z & NIBBLE_MASK == (x & NIBBLE_MASK) | (y & NIBBLE_MASK),
        OpCode::Push | OpCode::Halt => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(v: u64) -> F {
        F::from(v)
    }

    fn row(op: OpCode, x: u64, y: u64, z: u64) -> OpenedRow {
        OpenedRow {
            pc: fe(4),
            pc_next: fe(5),
            opcode: fe(op.as_u8() as u64),
            x: fe(x),
            y: fe(y),
            z: fe(z),
            halt: F::zero(),
        }
    }

    #[test]
    fn test_defect_zero_for_sequential_pc() {
        let columns = TraceColumns {
            pc: vec![fe(0), fe(1), fe(2), fe(0)],
            halt: vec![fe(0), fe(0), fe(1), fe(0)],
            ..TraceColumns::from_fn(|_| vec![F::zero(); 4])
        };
        assert!(CpuChip::defect_table(&columns, 3).iter().all(|d| d.is_zero()));
    }

    #[test]
    fn test_defect_flags_jump_and_ignores_halt_rows() {
        let columns = TraceColumns {
            pc: vec![fe(0), fe(2), fe(9), fe(0)],
            halt: vec![fe(0), fe(1), fe(0), fe(0)],
            ..TraceColumns::from_fn(|_| vec![F::zero(); 4])
        };
        let table = CpuChip::defect_table(&columns, 3);
        assert_eq!(table[0], fe(1));
        assert!(table[1].is_zero());
        assert!(table[2].is_zero());
        assert!(table[3].is_zero());
    }

    #[test]
    fn test_single_row_has_no_defects() {
        let columns = TraceColumns::from_fn(|_| vec![fe(7)]);
        assert_eq!(CpuChip::defect_table(&columns, 1), vec![F::zero()]);
    }

    #[test]
    fn test_arithmetic_semantics() {
        assert!(semantics_hold(OpCode::Add, u64::MAX, 2, 1));
        assert!(semantics_hold(OpCode::Sub, 7, 10, 7u64.wrapping_sub(10)));
        assert!(!semantics_hold(OpCode::Sub, 7, 10, 3));
        assert!(semantics_hold(OpCode::Mul, 6, 7, 42));
        assert!(semantics_hold(OpCode::Push, 1, 2, 3));
    }

    #[test]
    fn test_bitwise_semantics_use_low_nibble() {
        assert!(semantics_hold(OpCode::And, 0b1100, 0b1010, 0b1000));
        assert!(!semantics_hold(OpCode::And, 0b1100, 0b1010, 0b1001));
        assert!(semantics_hold(OpCode::Or, 0xF3, 0x04, 0x17));
    }

    #[test]
    fn test_check_row_order() {
        assert!(CpuChip::check_row(&row(OpCode::Add, 2, 3, 5)).is_ok());

        let mut r = row(OpCode::Add, 2, 3, 6);
        assert_eq!(
            CpuChip::check_row(&r),
            Err(RowViolation::Semantics(OpCode::Add))
        );
        r.pc_next = fe(9);
        assert_eq!(CpuChip::check_row(&r), Err(RowViolation::PcTransition));
        r.halt = fe(2);
        assert_eq!(CpuChip::check_row(&r), Err(RowViolation::HaltNotBoolean));
    }

    #[test]
    fn test_halt_row_skips_transition() {
        let mut r = row(OpCode::Halt, 0, 0, 5);
        r.halt = F::one();
        r.pc_next = F::zero();
        assert!(CpuChip::check_row(&r).is_ok());
    }

    #[test]
    fn test_out_of_range_and_unknown_opcode() {
        let mut r = row(OpCode::Add, 2, 3, 5);
        r.y = -F::one();
        assert_eq!(
            CpuChip::check_row(&r),
            Err(RowViolation::OperandOutOfRange(Column::Y))
        );
        r.opcode = fe(6);
        assert_eq!(CpuChip::check_row(&r), Err(RowViolation::OpcodeNotAllowed));
        assert!(opcode_allowed(&fe(255)));
        assert!(!opcode_allowed(&fe(255 + (1 << 32))));
    }
}
