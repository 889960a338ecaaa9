use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zktrace_prover::chips::lookup::LOOKUP_ROWS;
use zktrace_prover::session::commit_code;
use zktrace_prover::{
    ExecutionTrace, LookupTable, OpCode, ProtocolConfig, Prover, SessionBinding, Srs, TraceRow,
    Verifier,
};

/// Straight-line arithmetic trace of `len` rows ending in HALT
fn arithmetic_trace(len: usize) -> ExecutionTrace {
    let mut rows = Vec::with_capacity(len);
    let mut acc = 1u64;
    for i in 0..len.saturating_sub(1) {
        let y = (i as u64 % 7) + 1;
        let (op, z) = match i % 3 {
            0 => (OpCode::Add, acc.wrapping_add(y)),
            1 => (OpCode::Mul, acc.wrapping_mul(y)),
            _ => (OpCode::And, (acc & y) & 0xF),
        };
        rows.push(TraceRow::new(i as u32, op, acc, y, z));
        acc = z;
    }
    rows.push(TraceRow::halt(rows.len() as u32, acc));
    ExecutionTrace::new(rows)
}

fn setup() -> (Arc<Srs>, Arc<LookupTable>) {
    let srs = Arc::new(Srs::deterministic("bench", 1024.max(LOOKUP_ROWS)));
    let table = Arc::new(LookupTable::build(&srs).expect("table fits"));
    (srs, table)
}

fn bench_prove(c: &mut Criterion) {
    let (srs, table) = setup();
    let prover = Prover::new(ProtocolConfig::default(), Arc::clone(&srs)).with_lookup_table(table);
    let code = commit_code(&srs, b"bench program").expect("code fits");
    let binding = SessionBinding::from_label("bench", &[]);

    let mut group = c.benchmark_group("prove");
    for len in [16usize, 64, 256, 1024] {
        let trace = arithmetic_trace(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &trace, |b, trace| {
            b.iter(|| prover.prove(&code, &binding, black_box(trace)).expect("prove"))
        });
    }
    group.finish();
}

fn bench_verify(c: &mut Criterion) {
    let (srs, table) = setup();
    let prover =
        Prover::new(ProtocolConfig::default(), Arc::clone(&srs)).with_lookup_table(Arc::clone(&table));
    let verifier = Verifier::new(ProtocolConfig::default(), Arc::clone(&srs))
        .expect("verifier setup")
        .with_lookup_commitments(*table.commitments());
    let code = commit_code(&srs, b"bench program").expect("code fits");
    let binding = SessionBinding::from_label("bench", &[]);
    let proof = prover
        .prove(&code, &binding, &arithmetic_trace(256))
        .expect("prove");

    c.bench_function("verify/256", |b| {
        b.iter(|| verifier.verify(&code, &binding, black_box(&proof)).expect("verify"))
    });
}

fn bench_lookup_table(c: &mut Criterion) {
    let srs = Srs::deterministic("bench", LOOKUP_ROWS);
    c.bench_function("lookup_table/build", |b| {
        b.iter(|| LookupTable::build(black_box(&srs)).expect("table fits"))
    });
}

criterion_group!(benches, bench_prove, bench_verify, bench_lookup_table);
criterion_main!(benches);
