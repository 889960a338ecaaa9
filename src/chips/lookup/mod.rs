//! Lookup Chip: the 4-bit AND/OR truth table.
//!
//! Rows `0..256` hold every `(a, b, a & b)` and rows `256..512` every
//! `(a, b, a | b)` for `a, b < 16`, at index `base + a·16 + b`. The fourth
//! column tags each row with the opcode byte. The table does not depend on
//! any program, so it is committed once and shared by every proof.

use ark_ff::Zero;
use tracing::debug;

use crate::chips::cpu::NIBBLE_MASK;
use crate::field::fr_from_u64;
use crate::kzg::{Commitment, KzgError, Opening, Srs};
use crate::poly::Polynomial;
use crate::trace::OpCode;
use crate::F;

/// Operand width covered by the table
pub const LOOKUP_BITS: u32 = 4;

/// Distinct operand values (`2^LOOKUP_BITS`)
pub const OPERAND_RANGE: u64 = 1 << LOOKUP_BITS;

/// Rows per operation block
pub const BLOCK_ROWS: u64 = OPERAND_RANGE * OPERAND_RANGE;

/// Total table rows (AND block then OR block)
pub const LOOKUP_ROWS: usize = 2 * BLOCK_ROWS as usize;

/// One value per table column
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableColumns<T> {
    pub a: T,
    pub b: T,
    pub result: T,
    /// Opcode byte of the operation
    pub op: T,
}

impl<T> TableColumns<T> {
    pub const NAMES: [&'static str; 4] = ["a", "b", "result", "op"];

    pub fn from_array([a, b, result, op]: [T; 4]) -> Self {
        Self { a, b, result, op }
    }

    pub fn into_array(self) -> [T; 4] {
        [self.a, self.b, self.result, self.op]
    }

    pub fn as_array(&self) -> [&T; 4] {
        [&self.a, &self.b, &self.result, &self.op]
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> TableColumns<U> {
        TableColumns::from_array(self.into_array().map(f))
    }

    /// Columns paired with their names, in commitment order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &T)> {
        Self::NAMES.into_iter().zip(self.as_array())
    }
}

impl<T: Send> TableColumns<T> {
    fn par_try_map<U: Send, E: Send>(
        self,
        f: impl Fn(T) -> Result<U, E> + Sync + Send,
    ) -> Result<TableColumns<U>, E> {
        let [a, b, result, op] = self.into_array();
        let f = &f;
        let ((a, b), (result, op)) = rayon::join(
            || rayon::join(|| f(a), || f(b)),
            || rayon::join(|| f(result), || f(op)),
        );
        Ok(TableColumns {
            a: a?,
            b: b?,
            result: result?,
            op: op?,
        })
    }
}

/// A decoded table row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableEntry {
    pub op: OpCode,
    pub a: u64,
    pub b: u64,
    pub result: u64,
}

/// First row of an operation's block
pub fn block_base(op: OpCode) -> Option<u64> {
    match op {
        OpCode::And => Some(0),
        OpCode::Or => Some(BLOCK_ROWS),
        _ => None,
    }
}

/// Apply a bitwise opcode to two nibbles
pub fn apply_bitwise(op: OpCode, a: u64, b: u64) -> Option<u64> {
    match op {
        OpCode::And => Some(a & b),
        OpCode::Or => Some(a | b),
        _ => None,
    }
}

/// Table row justifying `op` on the low nibbles of `x` and `y`
pub fn table_index(op: OpCode, x: u64, y: u64) -> Option<u64> {
    let base = block_base(op)?;
    Some(base + (x & NIBBLE_MASK) * OPERAND_RANGE + (y & NIBBLE_MASK))
}

/// Decode the row at `index`, `None` outside the table
pub fn table_entry(index: u64) -> Option<TableEntry> {
    if index >= LOOKUP_ROWS as u64 {
        return None;
    }
    let op = if index < BLOCK_ROWS {
        OpCode::And
    } else {
        OpCode::Or
    };
    let offset = index % BLOCK_ROWS;
    let (a, b) = (offset / OPERAND_RANGE, offset % OPERAND_RANGE);
    let result = apply_bitwise(op, a, b)?;
    Some(TableEntry { op, a, b, result })
}

/// Evaluations of the four table columns over `0..LOOKUP_ROWS`
pub fn table_values() -> TableColumns<Vec<F>> {
    let mut columns = TableColumns {
        a: vec![F::zero(); LOOKUP_ROWS],
        b: vec![F::zero(); LOOKUP_ROWS],
        result: vec![F::zero(); LOOKUP_ROWS],
        op: vec![F::zero(); LOOKUP_ROWS],
    };
    for index in 0..LOOKUP_ROWS {
        if let Some(entry) = table_entry(index as u64) {
            columns.a[index] = fr_from_u64(entry.a);
            columns.b[index] = fr_from_u64(entry.b);
            columns.result[index] = fr_from_u64(entry.result);
            columns.op[index] = fr_from_u64(entry.op.as_u8() as u64);
        }
    }
    columns
}

/// The committed lookup table
#[derive(Clone, Debug)]
pub struct LookupTable {
    polynomials: TableColumns<Polynomial>,
    commitments: TableColumns<Commitment>,
}

impl LookupTable {
    /// Interpolate and commit the table. Needs an SRS of at least
    /// [`LOOKUP_ROWS`] powers.
    pub fn build(srs: &Srs) -> Result<Self, KzgError> {
        let polynomials = table_values()
            .par_try_map(|values| Ok::<_, KzgError>(Polynomial::interpolate_range(&values)))?;
        Self::from_polynomials(srs, polynomials)
    }

    /// Commit polynomials loaded from elsewhere (e.g. the table files)
    pub fn from_polynomials(
        srs: &Srs,
        polynomials: TableColumns<Polynomial>,
    ) -> Result<Self, KzgError> {
        let commitments = polynomials
            .clone()
            .par_try_map(|poly| srs.commit_poly(&poly))?;
        debug!(rows = LOOKUP_ROWS, "committed lookup table");
        Ok(Self {
            polynomials,
            commitments,
        })
    }

    pub fn polynomials(&self) -> &TableColumns<Polynomial> {
        &self.polynomials
    }

    pub fn commitments(&self) -> &TableColumns<Commitment> {
        &self.commitments
    }

    /// Open all four columns at one table row
    pub fn open(&self, srs: &Srs, index: u64) -> Result<TableColumns<Opening>, KzgError> {
        let [a, b, result, op] = self.polynomials.as_array();
        Ok(TableColumns {
            a: srs.open(a, index)?,
            b: srs.open(b, index)?,
            result: srs.open(result, index)?,
            op: srs.open(op, index)?,
        })
    }
}
