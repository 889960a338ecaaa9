mod common;

use common::*;
use zktrace_prover::machine::DEMO_PROGRAM;
use zktrace_prover::{ExecutionTrace, OpCode, SessionBinding, TraceRow, Verdict};

#[test]
fn test_demo_program_accepts() {
    let session = prove_program(DEMO_PROGRAM, "e2e-demo", &[]);
    assert!(session.proof.uses_lookup());
    assert_eq!(session.proof.lookup_openings.len(), 1);
    assert_eq!(session.proof.final_output, 11);
    assert_eq!(verify(&session), Verdict::Accept);
}

#[test]
fn test_arithmetic_program_accepts_without_lookup() {
    let session = prove_program("push 6\npush 7\nmul\npush 2\nsub\nhalt", "e2e-arith", &[]);
    assert!(!session.proof.uses_lookup());
    assert_eq!(session.proof.final_output, 40);
    assert_eq!(verify(&session), Verdict::Accept);
}

#[test]
fn test_inputs_are_bound() {
    let session = prove_program("add\nhalt", "e2e-inputs", &[20, 22]);
    assert_eq!(session.proof.final_output, 42);
    assert_eq!(verify(&session), Verdict::Accept);

    let other_inputs = SessionBinding::from_label("e2e-inputs", &[21, 21]);
    let verdict = verifier()
        .verify(&session.code, &other_inputs, &session.proof)
        .unwrap();
    assert_eq!(reject_code(verdict), "input-hash-mismatch");
}

#[test]
fn test_single_halt_row_accepts() {
    let session = prove_trace(ExecutionTrace::halt_only(), "e2e-halt");
    assert_eq!(session.proof.trace_len, 1);
    assert!(session.proof.row_openings.is_empty());
    assert_eq!(verify(&session), Verdict::Accept);
}

#[test]
fn test_non_power_of_two_trace() {
    // 6 rows pad to 8
    let session = prove_program(DEMO_PROGRAM, "e2e-pad", &[]);
    assert_eq!(session.proof.trace_len, 6);
    assert_eq!(session.proof.trace_pow2, 8);
    assert_eq!(session.proof.sumcheck.rounds.len(), 3);
    assert_eq!(verify(&session), Verdict::Accept);
}

#[test]
fn test_expected_output() {
    let mut session = prove_program(DEMO_PROGRAM, "e2e-expect", &[]);
    session.binding = session.binding.clone().with_expected_output(11);
    assert_eq!(verify(&session), Verdict::Accept);

    session.binding = session.binding.clone().with_expected_output(12);
    assert_eq!(reject_code(verify(&session)), "output-mismatch");
}

#[test]
fn test_and_semantics_violation_rejected() {
    // 12 AND 10 is 8, the trace claims 9
    let trace = ExecutionTrace::new(vec![
        TraceRow::new(0, OpCode::And, 0b1100, 0b1010, 0b1001),
        TraceRow::halt(1, 0b1001),
    ]);
    let session = prove_trace(trace, "e2e-bad-and");
    assert_eq!(session.proof.lookup_openings.len(), 1);
    assert_eq!(reject_code(verify(&session)), "and-semantics-failed");
}

#[test]
fn test_honest_and_accepts() {
    let trace = ExecutionTrace::new(vec![
        TraceRow::new(0, OpCode::And, 0b1100, 0b1010, 0b1000),
        TraceRow::halt(1, 0b1000),
    ]);
    assert_eq!(verify(&prove_trace(trace, "e2e-and")), Verdict::Accept);
}

#[test]
fn test_unbalanced_transition_fails_sumcheck() {
    let trace = ExecutionTrace::new(vec![
        TraceRow::new(0, OpCode::Push, 0, 1, 1),
        TraceRow::halt(2, 1),
    ]);
    let session = prove_trace(trace, "e2e-skip");
    assert_eq!(reject_code(verify(&session)), "sumcheck-claimed-sum-nonzero");
}

#[test]
fn test_cancelling_transitions_caught_by_row_checks() {
    // defects +1 and -1 sum to zero, so only the sampled rows can catch it
    let trace = ExecutionTrace::new(vec![
        TraceRow::new(0, OpCode::Push, 0, 1, 1),
        TraceRow::new(2, OpCode::Push, 0, 2, 2),
        TraceRow::halt(2, 2),
    ]);
    let session = prove_trace(trace, "e2e-cancel");
    assert_eq!(reject_code(verify(&session)), "pc-transition-failed");
}

#[test]
fn test_forced_row_indices() {
    let trace = ExecutionTrace::new(vec![
        TraceRow::new(0, OpCode::Push, 0, 1, 1),
        TraceRow::halt(2, 1),
    ]);
    let session = prove_trace(trace, "e2e-forced");
    let indices = vec![0; session.proof.row_openings.len()];
    let err = verifier()
        .check_row_openings(&session.proof, &indices)
        .unwrap_err();
    assert_eq!(err.code(), "pc-transition-failed");
}

#[test]
fn test_recorded_trace_file_proves() {
    let session = prove_program(DEMO_PROGRAM, "e2e-file", &[]);
    let path = std::env::temp_dir().join(format!("zktrace-e2e-{}.json", std::process::id()));
    session.trace.save(&path).unwrap();
    let loaded = ExecutionTrace::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, session.trace);

    let reproved = prover()
        .prove(&session.code, &session.binding, &loaded)
        .unwrap();
    assert_eq!(reproved, session.proof);
}
