//! Execution trace types

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chips::TraceColumns;
use crate::field::fr_from_u64;
use crate::F;

/// Modeled opcodes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum OpCode {
    Push = 0,
    Add = 1,
    Mul = 2,
    Sub = 3,
    And = 4,
    Or = 5,
    Halt = 255,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("unknown opcode {0}")]
pub struct InvalidOpCode(pub u8);

impl OpCode {
    pub const ALL: [OpCode; 7] = [
        OpCode::Push,
        OpCode::Add,
        OpCode::Mul,
        OpCode::Sub,
        OpCode::And,
        OpCode::Or,
        OpCode::Halt,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_u8() == value)
    }

    /// Look up an opcode from a 64-bit column value
    pub fn from_u64(value: u64) -> Option<Self> {
        u8::try_from(value).ok().and_then(Self::from_u8)
    }

    /// AND / OR, the operations justified by the lookup table
    pub fn is_bitwise(self) -> bool {
        matches!(self, OpCode::And | OpCode::Or)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Push => "push",
            OpCode::Add => "add",
            OpCode::Mul => "mul",
            OpCode::Sub => "sub",
            OpCode::And => "and",
            OpCode::Or => "or",
            OpCode::Halt => "halt",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }
}

impl TryFrom<u8> for OpCode {
    type Error = InvalidOpCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(InvalidOpCode(value))
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op.as_u8()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// One executed, recognized instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRow {
    /// Program counter (instruction index)
    pub step_index: u32,
    pub opcode: OpCode,
    /// Left operand
    pub operand_x: u64,
    /// Right operand
    pub operand_y: u64,
    pub result: u64,
    pub is_halt: bool,
}

impl TraceRow {
    pub fn new(step_index: u32, opcode: OpCode, x: u64, y: u64, result: u64) -> Self {
        Self {
            step_index,
            opcode,
            operand_x: x,
            operand_y: y,
            result,
            is_halt: opcode == OpCode::Halt,
        }
    }

    /// Terminal row carrying the program's final output
    pub fn halt(step_index: u32, result: u64) -> Self {
        Self::new(step_index, OpCode::Halt, 0, 0, result)
    }

    /// Field shadows of the row, one value per trace column
    pub fn to_field_row(&self) -> TraceColumns<F> {
        TraceColumns {
            pc: fr_from_u64(self.step_index as u64),
            opcode: fr_from_u64(self.opcode.as_u8() as u64),
            x: fr_from_u64(self.operand_x),
            y: fr_from_u64(self.operand_y),
            z: fr_from_u64(self.result),
            halt: fr_from_u64(self.is_halt as u64),
        }
    }
}

/// Complete execution trace
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub rows: Vec<TraceRow>,
}

impl ExecutionTrace {
    pub fn new(rows: Vec<TraceRow>) -> Self {
        Self { rows }
    }

    /// Single HALT row with output 0
    pub fn halt_only() -> Self {
        Self::new(vec![TraceRow::halt(0, 0)])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Result of the last row, or 0 for an empty trace
    pub fn final_output(&self) -> u64 {
        self.rows.last().map(|row| row.result).unwrap_or(0)
    }

    /// Rows whose opcode needs a lookup-table opening
    pub fn bitwise_rows(&self) -> impl Iterator<Item = (usize, &TraceRow)> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.opcode.is_bitwise())
    }

    pub fn uses_bitwise(&self) -> bool {
        self.bitwise_rows().next().is_some()
    }

    /// Load a trace; `.json` files are JSON, anything else bincode
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("reading trace {}", path.display()))?;
        let trace: Self = if is_json(path) {
            serde_json::from_slice(&data)?
        } else {
            bincode::deserialize(&data)?
        };
        Ok(trace)
    }

    /// Save the trace, picking the encoding from the extension like [`Self::load`]
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = if is_json(path) {
            serde_json::to_vec_pretty(self)?
        } else {
            bincode::serialize(self)?
        };
        std::fs::write(path, data)
            .with_context(|| format!("writing trace {}", path.display()))?;
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("zktrace-trace-{}-{}", std::process::id(), name))
    }

    fn sample() -> ExecutionTrace {
        ExecutionTrace::new(vec![
            TraceRow::new(0, OpCode::Push, 0, 3, 3),
            TraceRow::new(1, OpCode::Push, 0, 4, 4),
            TraceRow::new(2, OpCode::And, 3, 4, 0),
            TraceRow::halt(3, 0),
        ])
    }

    #[test]
    fn test_opcode_byte_roundtrip() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::try_from(op.as_u8()), Ok(op));
        }
        assert_eq!(OpCode::try_from(6), Err(InvalidOpCode(6)));
        assert_eq!(OpCode::from_u64(255), Some(OpCode::Halt));
        assert_eq!(OpCode::from_u64(256 + 1), None);
    }

    #[test]
    fn test_opcode_serializes_as_byte() {
        assert_eq!(serde_json::to_string(&OpCode::Halt).unwrap(), "255");
        assert!(serde_json::from_str::<OpCode>("7").is_err());
    }

    #[test]
    fn test_field_row_shadows() {
        let row = TraceRow::halt(3, 9).to_field_row();
        assert_eq!(row.pc, F::from(3u64));
        assert_eq!(row.opcode, F::from(255u64));
        assert_eq!(row.z, F::from(9u64));
        assert_eq!(row.halt, F::from(1u64));
    }

    #[test]
    fn test_bitwise_rows() {
        let trace = sample();
        let rows: Vec<usize> = trace.bitwise_rows().map(|(i, _)| i).collect();
        assert_eq!(rows, vec![2]);
        assert!(!ExecutionTrace::halt_only().uses_bitwise());
        assert_eq!(trace.final_output(), 0);
        assert_eq!(ExecutionTrace::default().final_output(), 0);
    }

    #[test]
    fn test_save_load_json_and_bincode() {
        let trace = sample();
        for name in ["t.json", "t.bin"] {
            let path = temp_path(name);
            trace.save(&path).unwrap();
            assert_eq!(ExecutionTrace::load(&path).unwrap(), trace);
            std::fs::remove_file(&path).unwrap();
        }
    }
}
