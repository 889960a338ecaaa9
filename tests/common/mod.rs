#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use zktrace_prover::chips::lookup::LOOKUP_ROWS;
use zktrace_prover::session::commit_code;
use zktrace_prover::{
    CodeCommitment, ExecutionTrace, LookupTable, Program, Proof, ProtocolConfig, Prover,
    SessionBinding, Srs, StackMachine, Verdict, Verifier,
};

pub struct Fixture {
    pub srs: Arc<Srs>,
    pub table: Arc<LookupTable>,
}

/// SRS large enough for the lookup table, built once per test binary
pub fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let srs = Arc::new(Srs::deterministic("integration-tests", LOOKUP_ROWS));
        let table = Arc::new(LookupTable::build(&srs).expect("table fits the SRS"));
        Fixture { srs, table }
    })
}

pub fn prover() -> Prover {
    let f = fixture();
    Prover::new(ProtocolConfig::default(), Arc::clone(&f.srs)).with_lookup_table(Arc::clone(&f.table))
}

pub fn verifier() -> Verifier {
    let f = fixture();
    Verifier::new(ProtocolConfig::default(), Arc::clone(&f.srs))
        .expect("SRS holds the blinding powers")
        .with_lookup_commitments(*f.table.commitments())
}

pub fn commit(code: &[u8]) -> CodeCommitment {
    commit_code(&fixture().srs, code).expect("code fits the SRS")
}

pub struct Session {
    pub code: CodeCommitment,
    pub binding: SessionBinding,
    pub trace: ExecutionTrace,
    pub proof: Proof,
}

/// Run a stack program and prove it for `label`
pub fn prove_program(source: &str, label: &str, inputs: &[i64]) -> Session {
    let program = Program::parse(source).expect("valid program");
    let trace = StackMachine::run(&program, inputs).expect("program runs");
    let code = commit(&program.to_bytes());
    let binding = SessionBinding::from_label(label, inputs);
    let proof = prover().prove(&code, &binding, &trace).expect("proving succeeds");
    Session {
        code,
        binding,
        trace,
        proof,
    }
}

/// Prove an arbitrary trace under a fixed code commitment
pub fn prove_trace(trace: ExecutionTrace, label: &str) -> Session {
    let code = commit(b"hand-written trace");
    let binding = SessionBinding::from_label(label, &[]);
    let proof = prover().prove(&code, &binding, &trace).expect("proving succeeds");
    Session {
        code,
        binding,
        trace,
        proof,
    }
}

pub fn verify(session: &Session) -> Verdict {
    verifier()
        .verify(&session.code, &session.binding, &session.proof)
        .expect("proof is well-formed")
}

pub fn verify_proof(session: &Session, proof: &Proof) -> Verdict {
    verifier()
        .verify(&session.code, &session.binding, proof)
        .expect("proof is well-formed")
}

pub fn reject_code(verdict: Verdict) -> &'static str {
    verdict.rejection().map(|r| r.code()).unwrap_or("accept")
}
