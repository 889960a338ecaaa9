//! Line-oriented `key: value` files for commitments, proofs and lookup
//! table polynomials.
//!
//! Readers are strict: every key must appear in the order the writer emits
//! it, hashes and curve elements are lowercase hex of their canonical
//! encoding, integers are plain decimal. Anything a writer would not have
//! produced is rejected, so writing a parsed file reproduces it exactly.

use std::fmt::{self, Display};
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use ark_ff::PrimeField;
use ark_serialize::CanonicalDeserialize;
use thiserror::Error;

use crate::chips::{TableColumns, TraceColumns};
use crate::field::{fr_to_be_bytes, to_bytes};
use crate::hash::Hash256;
use crate::kzg::{Commitment, Opening};
use crate::poly::Polynomial;
use crate::proof::{LookupOpening, Proof, RowOpening};
use crate::session::CodeCommitment;
use crate::sumcheck::{SumcheckProof, SumcheckRound};
use crate::{COMMITMENT_VERSION, F, G1, PROOF_VERSION};

pub const COMMITMENT_FORMAT: &str = "zktrace-commitment";
pub const PROOF_FORMAT: &str = "zktrace-proof";

/// File name of each lookup table column inside a table directory
pub const TABLE_FILES: TableColumns<&str> = TableColumns {
    a: "lut_and_or_a.txt",
    b: "lut_and_or_b.txt",
    result: "lut_and_or_result.txt",
    op: "lut_and_or_op.txt",
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct CodecError {
    /// 1-based line number (one past the end for a truncated file)
    pub line: usize,
    pub kind: CodecErrorKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecErrorKind {
    #[error("unexpected end of file, expected `{0}`")]
    UnexpectedEof(String),
    #[error("expected key `{expected}`, found `{found}`")]
    UnexpectedKey { expected: String, found: String },
    #[error("line is not `key: value`")]
    MissingSeparator,
    #[error("`{0}` is not a canonical decimal integer")]
    InvalidInteger(String),
    #[error("`{0}` is not canonical lowercase hex of the expected length")]
    InvalidHex(String),
    #[error("`{key}` is not a valid {what}")]
    InvalidElement { key: String, what: &'static str },
    #[error("unsupported {key} `{value}`")]
    Unsupported { key: String, value: String },
    #[error("content after the last field")]
    TrailingContent,
}

/// Where a committed program came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Assembly source text
    Asm,
    /// Executable binary
    Bin,
    /// Stack-machine program
    Stack,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Asm => "asm",
            SourceKind::Bin => "bin",
            SourceKind::Stack => "stack",
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asm" => Ok(SourceKind::Asm),
            "bin" => Ok(SourceKind::Bin),
            "stack" => Ok(SourceKind::Stack),
            other => Err(format!("unknown source kind `{other}`")),
        }
    }
}

/// Contents of a commitment file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentRecord {
    pub source_kind: SourceKind,
    pub code_size: u64,
    pub code: CodeCommitment,
    /// Label of the SRS the commitment was made under
    pub srs_label: String,
}

struct KvWriter {
    out: String,
}

impl KvWriter {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn field(&mut self, key: &str, value: impl Display) {
        self.out.push_str(key);
        self.out.push_str(": ");
        self.out.push_str(&value.to_string());
        self.out.push('\n');
    }

    fn hash(&mut self, key: &str, value: &Hash256) {
        self.field(key, hex::encode(value));
    }

    fn fr(&mut self, key: &str, value: &F) {
        self.field(key, hex::encode(to_bytes(value)));
    }

    fn g1(&mut self, key: &str, value: &G1) {
        self.field(key, hex::encode(to_bytes(value)));
    }

    fn commitment(&mut self, key: &str, value: &Commitment) {
        self.g1(key, &value.0);
    }

    fn opening(&mut self, prefix: &str, opening: &Opening) {
        self.field(&format!("{prefix}.index"), opening.index);
        self.fr(&format!("{prefix}.value"), &opening.value);
        self.g1(&format!("{prefix}.witness"), &opening.witness);
    }

    fn finish(self) -> String {
        self.out
    }
}

struct KvReader<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    last_line: usize,
}

impl<'a> KvReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            last_line: 0,
        }
    }

    fn error(&self, kind: CodecErrorKind) -> CodecError {
        CodecError {
            line: self.last_line,
            kind,
        }
    }

    fn next(&mut self, key: &str) -> Result<&'a str, CodecError> {
        let Some((index, line)) = self.lines.next() else {
            self.last_line += 1;
            return Err(self.error(CodecErrorKind::UnexpectedEof(key.to_string())));
        };
        self.last_line = index + 1;
        let (found, value) = line
            .split_once(": ")
            .ok_or_else(|| self.error(CodecErrorKind::MissingSeparator))?;
        if found != key {
            return Err(self.error(CodecErrorKind::UnexpectedKey {
                expected: key.to_string(),
                found: found.to_string(),
            }));
        }
        Ok(value)
    }

    fn literal(&mut self, key: &str, expected: &str) -> Result<(), CodecError> {
        let value = self.next(key)?;
        if value != expected {
            return Err(self.error(CodecErrorKind::Unsupported {
                key: key.to_string(),
                value: value.to_string(),
            }));
        }
        Ok(())
    }

    fn u64(&mut self, key: &str) -> Result<u64, CodecError> {
        let value = self.next(key)?;
        match value.parse::<u64>() {
            Ok(n) if n.to_string() == value => Ok(n),
            _ => Err(self.error(CodecErrorKind::InvalidInteger(key.to_string()))),
        }
    }

    fn string(&mut self, key: &str) -> Result<&'a str, CodecError> {
        self.next(key)
    }

    fn bytes<const N: usize>(&mut self, key: &str) -> Result<[u8; N], CodecError> {
        let value = self.next(key)?;
        let mut out = [0u8; N];
        let canonical = value.len() == 2 * N
            && value.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f'));
        if !canonical || hex::decode_to_slice(value, &mut out).is_err() {
            return Err(self.error(CodecErrorKind::InvalidHex(key.to_string())));
        }
        Ok(out)
    }

    fn hash(&mut self, key: &str) -> Result<Hash256, CodecError> {
        self.bytes::<32>(key)
    }

    fn fr(&mut self, key: &str) -> Result<F, CodecError> {
        let bytes = self.bytes::<32>(key)?;
        F::deserialize_compressed(&bytes[..]).map_err(|_| {
            self.error(CodecErrorKind::InvalidElement {
                key: key.to_string(),
                what: "field element",
            })
        })
    }

    fn g1(&mut self, key: &str) -> Result<G1, CodecError> {
        let bytes = self.bytes::<32>(key)?;
        G1::deserialize_compressed(&bytes[..]).map_err(|_| {
            self.error(CodecErrorKind::InvalidElement {
                key: key.to_string(),
                what: "G1 point",
            })
        })
    }

    fn commitment(&mut self, key: &str) -> Result<Commitment, CodecError> {
        self.g1(key).map(Commitment)
    }

    fn opening(&mut self, prefix: &str) -> Result<Opening, CodecError> {
        Ok(Opening {
            index: self.u64(&format!("{prefix}.index"))?,
            value: self.fr(&format!("{prefix}.value"))?,
            witness: self.g1(&format!("{prefix}.witness"))?,
        })
    }

    fn finish(mut self) -> Result<(), CodecError> {
        match self.lines.next() {
            None => Ok(()),
            Some((index, _)) => Err(CodecError {
                line: index + 1,
                kind: CodecErrorKind::TrailingContent,
            }),
        }
    }
}

pub fn write_commitment(record: &CommitmentRecord) -> String {
    let mut w = KvWriter::new();
    w.field("format", COMMITMENT_FORMAT);
    w.field("version", COMMITMENT_VERSION);
    w.field("source_kind", record.source_kind);
    w.field("code_size", record.code_size);
    w.hash("code_sha256", &record.code.code_hash);
    w.commitment("code_commitment", &record.code.base_commitment);
    w.field("srs_label", &record.srs_label);
    w.finish()
}

pub fn read_commitment(text: &str) -> Result<CommitmentRecord, CodecError> {
    let mut r = KvReader::new(text);
    r.literal("format", COMMITMENT_FORMAT)?;
    r.literal("version", &COMMITMENT_VERSION.to_string())?;
    let kind = r.string("source_kind")?;
    let source_kind = kind.parse().map_err(|_| {
        r.error(CodecErrorKind::Unsupported {
            key: "source_kind".into(),
            value: kind.to_string(),
        })
    })?;
    let code_size = r.u64("code_size")?;
    let code_hash = r.hash("code_sha256")?;
    let base_commitment = r.commitment("code_commitment")?;
    let srs_label = r.string("srs_label")?.to_string();
    r.finish()?;
    Ok(CommitmentRecord {
        source_kind,
        code_size,
        code: CodeCommitment {
            code_hash,
            base_commitment,
        },
        srs_label,
    })
}

pub fn write_proof(proof: &Proof) -> String {
    let mut w = KvWriter::new();
    w.field("format", PROOF_FORMAT);
    w.field("version", PROOF_VERSION);
    w.hash("code_sha256", &proof.code_hash);
    w.hash("domain_tag", &proof.domain_tag);
    w.hash("input_hash", &proof.input_hash);
    w.commitment("session_commitment", &proof.session_commitment);
    w.field("trace_len", proof.trace_len);
    w.field("trace_pow2", proof.trace_pow2);
    for (column, commitment) in proof.columns.iter() {
        w.commitment(&format!("commit.{}", column.name()), commitment);
    }

    match &proof.lookup_commitments {
        Some(table) => {
            w.field("lookup.present", 1);
            for (name, commitment) in table.iter() {
                w.commitment(&format!("lookup.commit.{name}"), commitment);
            }
        }
        None => w.field("lookup.present", 0),
    }

    w.fr("sumcheck.claimed_sum", &proof.sumcheck.claimed_sum);
    w.field("sumcheck.rounds", proof.sumcheck.rounds.len());
    for (i, round) in proof.sumcheck.rounds.iter().enumerate() {
        w.fr(&format!("sumcheck.round.{i}.g0"), &round.g0);
        w.fr(&format!("sumcheck.round.{i}.slope"), &round.slope);
    }

    w.field("opcode_openings", proof.opcode_openings.len());
    for (j, opening) in proof.opcode_openings.iter().enumerate() {
        w.opening(&format!("opcode_opening.{j}"), opening);
    }

    w.field("lookup_openings", proof.lookup_openings.len());
    for (j, group) in proof.lookup_openings.iter().enumerate() {
        w.field(&format!("lookup_opening.{j}.row"), group.row);
        w.field(&format!("lookup_opening.{j}.table_index"), group.table_index);
        for (name, opening) in group.openings.iter() {
            w.opening(&format!("lookup_opening.{j}.{name}"), opening);
        }
    }

    w.field("row_openings", proof.row_openings.len());
    for (j, row) in proof.row_openings.iter().enumerate() {
        w.field(&format!("row_opening.{j}.index"), row.index);
        for (name, opening) in row_opening_fields(row) {
            w.opening(&format!("row_opening.{j}.{name}"), opening);
        }
    }

    w.opening("output_opening", &proof.output_opening);
    w.field("final_output", proof.final_output);
    w.finish()
}

fn row_opening_fields(row: &RowOpening) -> [(&'static str, &Opening); 7] {
    [
        ("pc", &row.pc),
        ("pc_next", &row.pc_next),
        ("opcode", &row.opcode),
        ("x", &row.x),
        ("y", &row.y),
        ("z", &row.z),
        ("halt", &row.halt),
    ]
}

pub fn read_proof(text: &str) -> Result<Proof, CodecError> {
    let mut r = KvReader::new(text);
    r.literal("format", PROOF_FORMAT)?;
    r.literal("version", &PROOF_VERSION.to_string())?;
    let code_hash = r.hash("code_sha256")?;
    let domain_tag = r.hash("domain_tag")?;
    let input_hash = r.hash("input_hash")?;
    let session_commitment = r.commitment("session_commitment")?;
    let trace_len = r.u64("trace_len")?;
    let trace_pow2 = r.u64("trace_pow2")?;

    let mut commitments = Vec::with_capacity(TraceColumns::<()>::NUM_COLUMNS);
    for column in crate::chips::Column::ALL {
        commitments.push(r.commitment(&format!("commit.{}", column.name()))?);
    }
    let mut commitments = commitments.into_iter();
    let columns = TraceColumns::from_fn(|_| commitments.next().unwrap_or_default());

    let lookup_commitments = match r.u64("lookup.present")? {
        0 => None,
        1 => {
            let mut read = |name: &str| r.commitment(&format!("lookup.commit.{name}"));
            Some(TableColumns {
                a: read("a")?,
                b: read("b")?,
                result: read("result")?,
                op: read("op")?,
            })
        }
        other => {
            return Err(r.error(CodecErrorKind::Unsupported {
                key: "lookup.present".into(),
                value: other.to_string(),
            }))
        }
    };

    let claimed_sum = r.fr("sumcheck.claimed_sum")?;
    let num_rounds = r.u64("sumcheck.rounds")?;
    let mut rounds = Vec::new();
    for i in 0..num_rounds {
        rounds.push(SumcheckRound {
            g0: r.fr(&format!("sumcheck.round.{i}.g0"))?,
            slope: r.fr(&format!("sumcheck.round.{i}.slope"))?,
        });
    }

    let num_opcode = r.u64("opcode_openings")?;
    let mut opcode_openings = Vec::new();
    for j in 0..num_opcode {
        opcode_openings.push(r.opening(&format!("opcode_opening.{j}"))?);
    }

    let num_lookup = r.u64("lookup_openings")?;
    let mut lookup_openings = Vec::new();
    for j in 0..num_lookup {
        let row = r.u64(&format!("lookup_opening.{j}.row"))?;
        let table_index = r.u64(&format!("lookup_opening.{j}.table_index"))?;
        let mut read = |name: &str| r.opening(&format!("lookup_opening.{j}.{name}"));
        let openings = TableColumns {
            a: read("a")?,
            b: read("b")?,
            result: read("result")?,
            op: read("op")?,
        };
        lookup_openings.push(LookupOpening {
            row,
            table_index,
            openings,
        });
    }

    let num_rows = r.u64("row_openings")?;
    let mut row_openings = Vec::new();
    for j in 0..num_rows {
        let index = r.u64(&format!("row_opening.{j}.index"))?;
        let mut read = |name: &str| r.opening(&format!("row_opening.{j}.{name}"));
        row_openings.push(RowOpening {
            index,
            pc: read("pc")?,
            pc_next: read("pc_next")?,
            opcode: read("opcode")?,
            x: read("x")?,
            y: read("y")?,
            z: read("z")?,
            halt: read("halt")?,
        });
    }

    let output_opening = r.opening("output_opening")?;
    let final_output = r.u64("final_output")?;
    r.finish()?;

    Ok(Proof {
        code_hash,
        domain_tag,
        input_hash,
        session_commitment,
        trace_len,
        trace_pow2,
        columns,
        lookup_commitments,
        sumcheck: SumcheckProof {
            claimed_sum,
            rounds,
        },
        opcode_openings,
        lookup_openings,
        row_openings,
        output_opening,
        final_output,
    })
}

/// Coefficient file: the count, then one big-endian hex coefficient per line
pub fn write_table_poly(poly: &Polynomial) -> String {
    let mut out = format!("{}\n", poly.len());
    for coeff in poly.coeffs() {
        out.push_str(&hex::encode(fr_to_be_bytes(coeff)));
        out.push('\n');
    }
    out
}

pub fn read_table_poly(text: &str) -> Result<Polynomial, CodecError> {
    let mut lines = text.lines().enumerate();
    let err = |line: usize, kind| CodecError { line, kind };
    let (_, header) = lines
        .next()
        .ok_or_else(|| err(1, CodecErrorKind::UnexpectedEof("coefficient count".into())))?;
    let count: usize = match header.trim().parse::<usize>() {
        Ok(n) if n.to_string() == header.trim() => n,
        _ => return Err(err(1, CodecErrorKind::InvalidInteger("coefficient count".into()))),
    };

    let mut coeffs = Vec::new();
    for i in 0..count {
        let (index, line) = lines
            .next()
            .ok_or_else(|| err(i + 2, CodecErrorKind::UnexpectedEof(format!("coefficient {i}"))))?;
        let line = line.trim();
        let mut bytes = [0u8; 32];
        if line.len() != 64 || hex::decode_to_slice(line, &mut bytes).is_err() {
            return Err(err(index + 1, CodecErrorKind::InvalidHex(format!("coefficient {i}"))));
        }
        let value = F::from_be_bytes_mod_order(&bytes);
        if fr_to_be_bytes(&value) != bytes {
            return Err(err(
                index + 1,
                CodecErrorKind::InvalidElement {
                    key: format!("coefficient {i}"),
                    what: "field element",
                },
            ));
        }
        coeffs.push(value);
    }
    if let Some((index, line)) = lines.next() {
        if !line.trim().is_empty() {
            return Err(err(index + 1, CodecErrorKind::TrailingContent));
        }
    }
    Ok(Polynomial::new(coeffs))
}

/// Write the four table column files into `dir`
pub fn save_table_polynomials(dir: &Path, polys: &TableColumns<Polynomial>) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for (file, poly) in TABLE_FILES.as_array().into_iter().zip(polys.as_array()) {
        let path = dir.join(file);
        std::fs::write(&path, write_table_poly(poly))
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Read the four table column files from `dir`
pub fn load_table_polynomials(dir: &Path) -> anyhow::Result<TableColumns<Polynomial>> {
    let load = |file: &str| -> anyhow::Result<Polynomial> {
        let path = dir.join(file);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        read_table_poly(&text).with_context(|| format!("parsing {}", path.display()))
    };
    Ok(TableColumns {
        a: load(TABLE_FILES.a)?,
        b: load(TABLE_FILES.b)?,
        result: load(TABLE_FILES.result)?,
        op: load(TABLE_FILES.op)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kzg::Srs;
    use crate::session::commit_code;

    fn record() -> CommitmentRecord {
        let srs = Srs::deterministic("codec-test", 8);
        CommitmentRecord {
            source_kind: SourceKind::Stack,
            code_size: 5,
            code: commit_code(&srs, b"hello").unwrap(),
            srs_label: "codec-test".into(),
        }
    }

    #[test]
    fn test_commitment_roundtrip_is_exact() {
        let text = write_commitment(&record());
        assert!(text.starts_with("format: zktrace-commitment\nversion: 1\nsource_kind: stack\n"));
        let parsed = read_commitment(&text).unwrap();
        assert_eq!(parsed, record());
        assert_eq!(write_commitment(&parsed), text);
    }

    #[test]
    fn test_reordered_keys_rejected() {
        let text = write_commitment(&record()).replace("code_size: 5\n", "");
        let err = read_commitment(&text).unwrap_err();
        assert_eq!(err.line, 4);
        assert!(matches!(err.kind, CodecErrorKind::UnexpectedKey { .. }));
    }

    #[test]
    fn test_uppercase_hex_rejected() {
        let text = write_commitment(&record());
        let sha_line = text.lines().nth(4).unwrap();
        let upper = format!("code_sha256: {}", sha_line["code_sha256: ".len()..].to_uppercase());
        let tampered = text.replace(sha_line, &upper);
        let err = read_commitment(&tampered).unwrap_err();
        assert!(matches!(err.kind, CodecErrorKind::InvalidHex(_)));
    }

    #[test]
    fn test_invalid_point_rejected() {
        let text = write_commitment(&record());
        let line = text.lines().nth(5).unwrap();
        let bogus = format!("code_commitment: {}", "ff".repeat(32));
        let err = read_commitment(&text.replace(line, &bogus)).unwrap_err();
        assert_eq!(err.line, 6);
    }

    #[test]
    fn test_truncated_and_trailing() {
        let text = write_commitment(&record());
        let truncated: String = text.lines().take(3).map(|l| format!("{l}\n")).collect();
        assert!(matches!(
            read_commitment(&truncated).unwrap_err().kind,
            CodecErrorKind::UnexpectedEof(_)
        ));
        let extra = format!("{text}extra: 1\n");
        assert_eq!(
            read_commitment(&extra).unwrap_err().kind,
            CodecErrorKind::TrailingContent
        );
    }

    #[test]
    fn test_non_canonical_integer_rejected() {
        let text = write_commitment(&record()).replace("code_size: 5", "code_size: 05");
        assert!(matches!(
            read_commitment(&text).unwrap_err().kind,
            CodecErrorKind::InvalidInteger(_)
        ));
    }

    #[test]
    fn test_table_poly_roundtrip() {
        let poly = Polynomial::new(vec![F::from(1u64), -F::from(1u64), F::from(0u64)]);
        let text = write_table_poly(&poly);
        assert!(text.starts_with("3\n"));
        assert_eq!(read_table_poly(&text).unwrap(), poly);
    }

    #[test]
    fn test_table_poly_rejects_out_of_range() {
        let text = format!("1\n{}\n", "f".repeat(64));
        assert!(matches!(
            read_table_poly(&text).unwrap_err().kind,
            CodecErrorKind::InvalidElement { .. }
        ));
        assert!(read_table_poly("2\n").is_err());
    }
}
