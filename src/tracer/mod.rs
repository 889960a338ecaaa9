//! External trace producer.
//!
//! Single-steps a native AArch64 executable under a debugger and records one
//! [`TraceRow`] per recognized instruction. The debugger is abstracted behind
//! [`Debugger`] so the recorder can be driven by GDB/MI or by a script.

mod decode;
mod gdb;

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::chips::cpu::semantics_hold;
use crate::config::ProtocolConfig;
use crate::trace::{ExecutionTrace, TraceRow};

pub use decode::{decode_a64, DecodedOp, Operand, Shift, Width, ZERO_REGISTER};
pub use gdb::GdbMi;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to start gdb: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("gdb i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("gdb did not answer within {0:?}")]
    Timeout(Duration),
    #[error("gdb closed its output")]
    Disconnected,
    #[error("gdb command `{command}` failed: {response}")]
    Command { command: String, response: String },
    #[error("program exited before reaching main")]
    ExitedBeforeMain,
    #[error("cannot read register x{0}")]
    Register(u8),
}

/// Result of a single-step request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Stopped after one instruction
    Stopped,
    /// The inferior exited
    Exited,
    /// The step did not end in a clean stop
    Running,
}

pub trait Debugger {
    /// Disassembly of the instruction at the current pc
    fn current_instruction(&mut self) -> Result<String, TraceError>;

    fn step_instruction(&mut self) -> Result<StepOutcome, TraceError>;

    /// Value of general-purpose register `x<index>`
    fn read_register(&mut self, index: u8) -> Result<u64, TraceError>;
}

/// Register `index` as seen through `width`
fn read_reg<D: Debugger + ?Sized>(
    debugger: &mut D,
    index: u8,
    width: Width,
) -> Result<u64, TraceError> {
    if index == ZERO_REGISTER {
        Ok(0)
    } else {
        Ok(width.mask(debugger.read_register(index)?))
    }
}

fn read_operand<D: Debugger + ?Sized>(
    debugger: &mut D,
    operand: Operand,
    width: Width,
) -> Result<u64, TraceError> {
    match operand {
        Operand::Imm(value) => Ok(width.mask(value)),
        Operand::Reg(reg) => read_reg(debugger, reg, width),
        Operand::Shifted { reg, shift, amount } => {
            Ok(shift.apply_in(width, read_reg(debugger, reg, width)?, amount))
        }
    }
}

/// `(x, y)` operand values, read before the instruction executes
fn read_sources<D: Debugger + ?Sized>(
    debugger: &mut D,
    op: &DecodedOp,
) -> Result<(u64, u64), TraceError> {
    match *op {
        DecodedOp::Push { width, src, .. } => Ok((0, read_operand(debugger, src, width)?)),
        DecodedOp::Binary {
            width, lhs, rhs, ..
        } => {
            let x = read_reg(debugger, lhs, width)?;
            Ok((x, read_operand(debugger, rhs, width)?))
        }
    }
}

/// Step the inferior at most `max_steps` times, recording recognized
/// instructions.
///
/// A normal exit after at least one recorded row appends a HALT row
/// carrying the last result. A trace with no recorded rows becomes a
/// single HALT row.
///
/// Rows are checked with 64-bit arithmetic, so a 32-bit `w` instruction
/// whose result wrapped at 32 bits is skipped rather than recorded.
pub fn record_trace<D: Debugger + ?Sized>(
    debugger: &mut D,
    max_steps: usize,
) -> Result<ExecutionTrace, TraceError> {
    let mut rows: Vec<TraceRow> = Vec::new();
    let mut exited = false;

    for _ in 0..max_steps {
        let line = debugger.current_instruction()?;
        let decoded = decode_a64(&line);
        let sources = match &decoded {
            Some(op) => Some(read_sources(debugger, op)?),
            None => None,
        };

        match debugger.step_instruction()? {
            StepOutcome::Exited => {
                exited = true;
                break;
            }
            StepOutcome::Running => continue,
            StepOutcome::Stopped => {}
        }

        let (Some(op), Some((x, y))) = (decoded, sources) else {
            trace!(line = line.trim(), "skipped");
            continue;
        };
        let z = read_reg(debugger, op.dst(), op.width())?;
        if op.width() == Width::W && !semantics_hold(op.opcode(), x, y, z) {
            debug!(line = line.trim(), x, y, z, "32-bit result wrapped, skipped");
            continue;
        }
        let row = TraceRow::new(rows.len() as u32, op.opcode(), x, y, z);
        trace!(?row, "recorded");
        rows.push(row);
    }

    if rows.is_empty() {
        debug!("no recognized instructions, using a HALT-only trace");
        return Ok(ExecutionTrace::halt_only());
    }
    if exited {
        let last = rows.last().map(|row| row.result).unwrap_or(0);
        rows.push(TraceRow::halt(rows.len() as u32, last));
    }
    info!(rows = rows.len(), exited, "trace recorded");
    Ok(ExecutionTrace::new(rows))
}

/// Trace `executable` under GDB with the configured step budget and timeout
pub fn trace_executable(
    executable: &Path,
    args: &str,
    config: &ProtocolConfig,
) -> Result<ExecutionTrace, TraceError> {
    let timeout = Duration::from_millis(config.step_timeout_ms);
    let mut gdb = GdbMi::launch(executable, args, timeout)?;
    record_trace(&mut gdb, config.max_steps)
}
