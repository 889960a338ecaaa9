//! Reference stack machine.
//!
//! Runs straight-line stack programs in-process and records one trace row
//! per executed instruction, so traces can be produced without a debugger.
//!
//! Text form, one instruction per line:
//!
//! ```text
//! # comments start with '#' or ';'
//! push 12
//! push 10
//! and
//! halt
//! ```

use std::fmt;
use std::path::Path;

use anyhow::Context;
use thiserror::Error;
use tracing::debug;

use crate::chips::cpu::NIBBLE_MASK;
use crate::trace::{ExecutionTrace, OpCode, TraceRow};

/// Bytes per encoded instruction: opcode then a big-endian `i64`
pub const INSTRUCTION_BYTES: usize = 9;

/// Built-in program used by `zktrace demo`
pub const DEMO_PROGRAM: &str = "\
# (12 AND 10) + 3
push 12
push 10
and
push 3
add
halt
";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("line {line}: unknown instruction `{name}`")]
    UnknownInstruction { line: usize, name: String },
    #[error("line {line}: `push` needs an integer operand")]
    MissingImmediate { line: usize },
    #[error("line {line}: `{name}` takes no operand")]
    UnexpectedOperand { line: usize, name: String },
    #[error("line {line}: invalid integer `{text}`")]
    InvalidImmediate { line: usize, text: String },
    #[error("program bytes are not a multiple of {INSTRUCTION_BYTES}")]
    TruncatedBytecode,
    #[error("byte {offset}: unknown opcode {value}")]
    UnknownOpcode { offset: usize, value: u8 },
    #[error("step {step}: `{op}` needs two stack operands")]
    StackUnderflow { step: usize, op: OpCode },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: OpCode,
    /// Operand of `push`, zero otherwise
    pub imm: i64,
}

impl Instruction {
    pub fn push(imm: i64) -> Self {
        Self {
            op: OpCode::Push,
            imm,
        }
    }

    pub fn op(op: OpCode) -> Self {
        Self { op, imm: 0 }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            OpCode::Push => write!(f, "push {}", self.imm),
            op => f.write_str(op.mnemonic()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Parse the text form
    pub fn parse(source: &str) -> Result<Self, MachineError> {
        let mut instructions = Vec::new();
        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let text = raw
                .split(|c: char| c == '#' || c == ';')
                .next()
                .unwrap_or_default()
                .trim();
            if text.is_empty() {
                continue;
            }
            let mut parts = text.split_whitespace();
            let name = parts.next().unwrap_or_default();
            let operand = parts.next();
            if parts.next().is_some() {
                return Err(MachineError::UnexpectedOperand {
                    line,
                    name: name.to_string(),
                });
            }
            let op = OpCode::from_mnemonic(name).ok_or_else(|| MachineError::UnknownInstruction {
                line,
                name: name.to_string(),
            })?;
            let instruction = match (op, operand) {
                (OpCode::Push, Some(text)) => Instruction::push(parse_imm(text).ok_or_else(
                    || MachineError::InvalidImmediate {
                        line,
                        text: text.to_string(),
                    },
                )?),
                (OpCode::Push, None) => return Err(MachineError::MissingImmediate { line }),
                (op, None) => Instruction::op(op),
                (_, Some(_)) => {
                    return Err(MachineError::UnexpectedOperand {
                        line,
                        name: name.to_string(),
                    })
                }
            };
            instructions.push(instruction);
        }
        Ok(Self::new(instructions))
    }

    /// Read and parse a program file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading program {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("parsing program {}", path.display()))
    }

    /// Canonical bytes committed for this program
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.instructions.len() * INSTRUCTION_BYTES);
        for instruction in &self.instructions {
            out.push(instruction.op.as_u8());
            out.extend_from_slice(&instruction.imm.to_be_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MachineError> {
        if bytes.len() % INSTRUCTION_BYTES != 0 {
            return Err(MachineError::TruncatedBytecode);
        }
        bytes
            .chunks_exact(INSTRUCTION_BYTES)
            .enumerate()
            .map(|(i, chunk)| {
                let op = OpCode::from_u8(chunk[0]).ok_or(MachineError::UnknownOpcode {
                    offset: i * INSTRUCTION_BYTES,
                    value: chunk[0],
                })?;
                let mut imm = [0u8; 8];
                imm.copy_from_slice(&chunk[1..]);
                Ok(Instruction {
                    op,
                    imm: i64::from_be_bytes(imm),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn uses_bitwise(&self) -> bool {
        self.instructions.iter().any(|i| i.op.is_bitwise())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}

fn parse_imm(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { value.wrapping_neg() } else { value })
}

/// Executes a [`Program`] and records its trace
#[derive(Clone, Debug, Default)]
pub struct StackMachine {
    stack: Vec<u64>,
}

impl StackMachine {
    /// Machine whose stack starts with `inputs`, last input on top
    pub fn with_inputs(inputs: &[i64]) -> Self {
        Self {
            stack: inputs.iter().map(|v| *v as u64).collect(),
        }
    }

    /// Run `program` from a stack holding `inputs`
    pub fn run(program: &Program, inputs: &[i64]) -> Result<ExecutionTrace, MachineError> {
        Self::with_inputs(inputs).execute(program)
    }

    pub fn execute(&mut self, program: &Program) -> Result<ExecutionTrace, MachineError> {
        let mut rows = Vec::with_capacity(program.len() + 1);
        for (step, instruction) in program.instructions().iter().enumerate() {
            let step_index = step as u32;
            match instruction.op {
                OpCode::Halt => {
                    rows.push(TraceRow::halt(step_index, self.top()));
                    debug!(steps = rows.len(), "program halted");
                    return Ok(ExecutionTrace::new(rows));
                }
                OpCode::Push => {
                    let value = instruction.imm as u64;
                    self.stack.push(value);
                    rows.push(TraceRow::new(step_index, OpCode::Push, 0, value, value));
                }
                op => {
                    let (b, a) = match (self.stack.pop(), self.stack.pop()) {
                        (Some(b), Some(a)) => (b, a),
                        _ => return Err(MachineError::StackUnderflow { step, op }),
                    };
                    let result = apply(op, a, b);
                    self.stack.push(result);
                    rows.push(TraceRow::new(step_index, op, a, b, result));
                }
            }
        }
        rows.push(TraceRow::halt(program.len() as u32, self.top()));
        debug!(steps = rows.len(), "program ran off the end");
        Ok(ExecutionTrace::new(rows))
    }

    fn top(&self) -> u64 {
        self.stack.last().copied().unwrap_or(0)
    }
}

fn apply(op: OpCode, a: u64, b: u64) -> u64 {
    match op {
        OpCode::Add => a.wrapping_add(b),
        OpCode::Sub => a.wrapping_sub(b),
        OpCode::Mul => a.wrapping_mul(b),
        OpCode::And => (a & b) & NIBBLE_MASK,
        OpCode::Or => (a | b) & NIBBLE_MASK,
        OpCode::Push | OpCode::Halt => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chips::cpu::semantics_hold;

    #[test]
    fn test_parse_demo() {
        let program = Program::parse(DEMO_PROGRAM).unwrap();
        assert_eq!(program.len(), 6);
        assert_eq!(program.instructions()[0], Instruction::push(12));
        assert_eq!(program.instructions()[2], Instruction::op(OpCode::And));
        assert!(program.uses_bitwise());
        assert_eq!(Program::parse(&program.to_string()).unwrap(), program);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Program::parse("push"),
            Err(MachineError::MissingImmediate { line: 1 })
        );
        assert!(matches!(
            Program::parse("\nxor"),
            Err(MachineError::UnknownInstruction { line: 2, .. })
        ));
        assert!(matches!(
            Program::parse("add 3"),
            Err(MachineError::UnexpectedOperand { .. })
        ));
        assert!(matches!(
            Program::parse("push five"),
            Err(MachineError::InvalidImmediate { .. })
        ));
    }

    #[test]
    fn test_immediates() {
        let program = Program::parse("push -3\npush 0x1f ; hex\nPUSH 7").unwrap();
        let imms: Vec<i64> = program.instructions().iter().map(|i| i.imm).collect();
        assert_eq!(imms, vec![-3, 31, 7]);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let program = Program::parse(DEMO_PROGRAM).unwrap();
        let bytes = program.to_bytes();
        assert_eq!(bytes.len(), 6 * INSTRUCTION_BYTES);
        assert_eq!(&bytes[..9], &[0, 0, 0, 0, 0, 0, 0, 0, 12]);
        assert_eq!(Program::from_bytes(&bytes).unwrap(), program);
        assert_eq!(
            Program::from_bytes(&bytes[..5]),
            Err(MachineError::TruncatedBytecode)
        );
    }

    #[test]
    fn test_demo_trace() {
        let program = Program::parse(DEMO_PROGRAM).unwrap();
        let trace = StackMachine::run(&program, &[]).unwrap();
        assert_eq!(
            trace.rows,
            vec![
                TraceRow::new(0, OpCode::Push, 0, 12, 12),
                TraceRow::new(1, OpCode::Push, 0, 10, 10),
                TraceRow::new(2, OpCode::And, 12, 10, 8),
                TraceRow::new(3, OpCode::Push, 0, 3, 3),
                TraceRow::new(4, OpCode::Add, 8, 3, 11),
                TraceRow::halt(5, 11),
            ]
        );
        assert_eq!(trace.final_output(), 11);
    }

    #[test]
    fn test_operand_order_and_inputs() {
        let program = Program::parse("sub\nhalt").unwrap();
        let trace = StackMachine::run(&program, &[10, 3]).unwrap();
        assert_eq!(trace.rows[0], TraceRow::new(0, OpCode::Sub, 10, 3, 7));
        assert_eq!(trace.final_output(), 7);
    }

    #[test]
    fn test_runs_off_end_into_halt() {
        let program = Program::parse("push 2\npush 4\nmul").unwrap();
        let trace = StackMachine::run(&program, &[]).unwrap();
        assert_eq!(trace.len(), 4);
        assert_eq!(trace.rows[3], TraceRow::halt(3, 8));
    }

    #[test]
    fn test_underflow() {
        let program = Program::parse("push 1\nadd").unwrap();
        assert_eq!(
            StackMachine::run(&program, &[]),
            Err(MachineError::StackUnderflow {
                step: 1,
                op: OpCode::Add
            })
        );
    }

    #[test]
    fn test_empty_program_is_halt_only() {
        let trace = StackMachine::run(&Program::default(), &[]).unwrap();
        assert_eq!(trace, ExecutionTrace::halt_only());
    }

    #[test]
    fn test_rows_satisfy_semantics() {
        let program = Program::parse("push 13\npush 6\nor\npush 9\nsub\npush 250\nmul").unwrap();
        let trace = StackMachine::run(&program, &[]).unwrap();
        for row in &trace.rows {
            assert!(
                semantics_hold(row.opcode, row.operand_x, row.operand_y, row.result),
                "{row:?}"
            );
        }
    }
}
