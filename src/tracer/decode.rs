//! AArch64 instruction recognizer over `x/i $pc` disassembly lines

use crate::trace::OpCode;

/// Register index read as zero (`xzr` / `wzr`)
pub const ZERO_REGISTER: u8 = 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shift {
    Lsl,
    Lsr,
    Asr,
}

impl Shift {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "lsl" => Some(Shift::Lsl),
            "lsr" => Some(Shift::Lsr),
            "asr" => Some(Shift::Asr),
            _ => None,
        }
    }

    /// Shift `value` by `amount`; out-of-range logical shifts give 0
    pub fn apply(self, value: u64, amount: u32) -> u64 {
        match self {
            Shift::Lsl => value.checked_shl(amount).unwrap_or(0),
            Shift::Lsr => value.checked_shr(amount).unwrap_or(0),
            Shift::Asr => ((value as i64) >> amount.min(63)) as u64,
        }
    }

    /// Shift within a register of `width`, zero-extending the result
    pub fn apply_in(self, width: Width, value: u64, amount: u32) -> u64 {
        match width {
            Width::X => self.apply(value, amount),
            Width::W => {
                let value = value as u32;
                let shifted = match self {
                    Shift::Lsl => value.checked_shl(amount).unwrap_or(0),
                    Shift::Lsr => value.checked_shr(amount).unwrap_or(0),
                    Shift::Asr => ((value as i32) >> amount.min(31)) as u32,
                };
                u64::from(shifted)
            }
        }
    }
}

/// Register view an instruction operates on: `x` (64-bit) or `w` (32-bit)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    X,
    W,
}

impl Width {
    fn of(reg: &str) -> Option<Self> {
        match reg.as_bytes().first()?.to_ascii_lowercase() {
            b'x' => Some(Width::X),
            b'w' => Some(Width::W),
            _ => None,
        }
    }

    /// W writes zero the upper half of the register
    pub fn mask(self, value: u64) -> u64 {
        match self {
            Width::X => value,
            Width::W => value & u64::from(u32::MAX),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(u8),
    Imm(u64),
    Shifted { reg: u8, shift: Shift, amount: u32 },
}

/// A recognized instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodedOp {
    /// `mov` and the `orr` zero-register alias
    Push { width: Width, dst: u8, src: Operand },
    Binary {
        op: OpCode,
        width: Width,
        dst: u8,
        lhs: u8,
        rhs: Operand,
    },
}

impl DecodedOp {
    pub fn opcode(&self) -> OpCode {
        match self {
            DecodedOp::Push { .. } => OpCode::Push,
            DecodedOp::Binary { op, .. } => *op,
        }
    }

    pub fn dst(&self) -> u8 {
        match self {
            DecodedOp::Push { dst, .. } | DecodedOp::Binary { dst, .. } => *dst,
        }
    }

    pub fn width(&self) -> Width {
        match self {
            DecodedOp::Push { width, .. } | DecodedOp::Binary { width, .. } => *width,
        }
    }
}

/// Decode one disassembly line, e.g.
/// `=> 0x400584 <main+8>:\tadd\tx0, x1, x2, lsl #2`.
/// Returns `None` for anything outside the modeled subset, including
/// forms that mix `x` and `w` registers.
pub fn decode_a64(line: &str) -> Option<DecodedOp> {
    let line = line.split("//").next().unwrap_or_default();
    let body = match line.find(">:") {
        Some(pos) => &line[pos + 2..],
        None => line.split_once(':').map(|(_, rest)| rest).unwrap_or(line),
    };
    let body = body.trim();
    let (mnemonic, rest) = body.split_once(char::is_whitespace)?;
    let operands: Vec<&str> = rest.split(',').map(str::trim).collect();

    let op = match mnemonic.to_ascii_lowercase().as_str() {
        "mov" => return decode_mov(&operands),
        "add" | "adds" => OpCode::Add,
        "sub" | "subs" => OpCode::Sub,
        "mul" => OpCode::Mul,
        "and" => OpCode::And,
        "orr" => OpCode::Or,
        _ => return None,
    };

    let width = Width::of(operands.first()?)?;
    let (dst, lhs, rhs) = match operands.as_slice() {
        [dst, lhs, rhs] => (
            parse_reg(dst, width)?,
            parse_reg(lhs, width)?,
            parse_operand(rhs, width)?,
        ),
        [dst, lhs, reg, shift] => (
            parse_reg(dst, width)?,
            parse_reg(lhs, width)?,
            parse_shifted(reg, shift, width)?,
        ),
        _ => return None,
    };
    if dst == ZERO_REGISTER {
        return None;
    }

    let push = |src| Some(DecodedOp::Push { width, dst, src });
    match (op, rhs) {
        (OpCode::Or, Operand::Reg(src)) if lhs == ZERO_REGISTER => push(Operand::Reg(src)),
        (OpCode::Or, Operand::Reg(ZERO_REGISTER)) => push(Operand::Reg(lhs)),
        (OpCode::Mul, Operand::Imm(_) | Operand::Shifted { .. }) => None,
        _ => Some(DecodedOp::Binary {
            op,
            width,
            dst,
            lhs,
            rhs,
        }),
    }
}

fn decode_mov(operands: &[&str]) -> Option<DecodedOp> {
    let [dst, src] = operands else {
        return None;
    };
    let width = Width::of(dst)?;
    let dst = parse_reg(dst, width)?;
    if dst == ZERO_REGISTER {
        return None;
    }
    let src = parse_operand(src, width)?;
    Some(DecodedOp::Push { width, dst, src })
}

/// `x0`..`x30` and `xzr`, or `w0`..`w30` and `wzr`, as `width` requires
fn parse_reg(text: &str, width: Width) -> Option<u8> {
    let text = text.to_ascii_lowercase();
    if Width::of(&text)? != width {
        return None;
    }
    let digits = &text[1..];
    if digits == "zr" {
        return Some(ZERO_REGISTER);
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u8>().ok().filter(|n| *n < ZERO_REGISTER)
}

fn parse_imm(text: &str) -> Option<u64> {
    let text = text.strip_prefix('#')?;
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    Some(if negative { value.wrapping_neg() } else { value })
}

fn parse_operand(text: &str, width: Width) -> Option<Operand> {
    if text.starts_with('#') {
        parse_imm(text).map(|imm| Operand::Imm(width.mask(imm)))
    } else {
        parse_reg(text, width).map(Operand::Reg)
    }
}

fn parse_shifted(reg: &str, shift: &str, width: Width) -> Option<Operand> {
    let reg = parse_reg(reg, width)?;
    let (kind, amount) = shift.split_once(char::is_whitespace)?;
    let shift = Shift::parse(&kind.to_ascii_lowercase())?;
    let amount = parse_imm(amount.trim())?;
    Some(Operand::Shifted {
        reg,
        shift,
        amount: u32::try_from(amount).ok()?,
    })
}
