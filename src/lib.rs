//! ZK Trace Prover v0.1
//!
//! KZG + sum-check prover for small execution traces over BN254.
//!
//! # Architecture
//!
//! A proof is produced in fixed phases, each feeding the next through a
//! Fiat–Shamir transcript:
//! - CPU Chip: encodes the trace into six column polynomials (pc, opcode, x, y, z, halt)
//! - Transition sum-check: proves the per-row pc defect sums to zero
//! - Lookup Chip: 4-bit AND/OR truth table, opened once per bitwise row
//! - Session binder: blinds the published code commitment with a verifier-chosen tag
//!
//! Traces come from the in-process stack machine (`machine`) or from a native
//! AArch64 executable single-stepped under GDB (`tracer`).
//!
//! The verifier never re-executes the program. It replays the transcript from the
//! proof's own commitments and checks every sampled opening with one pairing equation.
//!
//! The structured reference string is derived from a public label. That is fine for
//! development and tests and useless for a real deployment.

pub mod chips;
pub mod codec;
pub mod config;
pub mod field;
pub mod hash;
pub mod kzg;
pub mod machine;
pub mod poly;
pub mod proof;
pub mod prover;
pub mod session;
pub mod sumcheck;
pub mod trace;
pub mod tracer;
pub mod transcript;
pub mod verifier;

pub use chips::{LookupTable, TableColumns, TraceColumns};
pub use config::ProtocolConfig;
pub use kzg::{Commitment, Opening, Srs};
pub use machine::{Program, StackMachine};
pub use proof::Proof;
pub use prover::{Prover, ProverError};
pub use session::{CodeCommitment, SessionBinding};
pub use trace::{ExecutionTrace, OpCode, TraceRow};
pub use verifier::{Rejection, Verdict, Verifier, VerifyError};

/// The scalar field used throughout the prover (BN254 Fr)
pub type F = ark_bn254::Fr;

/// Commitment group
pub type G1 = ark_bn254::G1Affine;

/// Verifier-side pairing group
pub type G2 = ark_bn254::G2Affine;

/// Pairing engine
pub type Curve = ark_bn254::Bn254;

/// Proof file format version
pub const PROOF_VERSION: u32 = 1;

/// Commitment file format version
pub const COMMITMENT_VERSION: u32 = 1;
