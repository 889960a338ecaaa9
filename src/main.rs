//! zktrace: commit to a program, prove an execution trace, verify a proof

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zktrace_prover::chips::lookup::LOOKUP_ROWS;
use zktrace_prover::chips::cpu::padded_len;
use zktrace_prover::codec::{self, CommitmentRecord, SourceKind};
use zktrace_prover::machine::DEMO_PROGRAM;
use zktrace_prover::session::commit_code;
use zktrace_prover::tracer::trace_executable;
use zktrace_prover::{
    CodeCommitment, ExecutionTrace, LookupTable, Program, Proof, ProtocolConfig, Prover,
    SessionBinding, Srs, StackMachine, Verdict, Verifier,
};

const DEFAULT_DOMAIN: &str = "zktrace-default-session";

#[derive(Parser, Debug)]
#[command(name = "zktrace", version, about = "KZG + sum-check execution trace prover")]
struct Cli {
    /// JSON protocol configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish a commitment to a program
    Commit {
        program: PathBuf,
        /// asm, bin or stack; inferred from the extension when omitted
        #[arg(long, value_parser = parse_kind)]
        kind: Option<SourceKind>,
        /// Output file [default: <program>.commit]
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Trace a program and prove the trace
    Prove {
        program: PathBuf,
        /// Tracer step budget
        #[arg(long)]
        steps: Option<usize>,
        /// Session label chosen by the verifier
        #[arg(long, default_value = DEFAULT_DOMAIN)]
        domain: String,
        /// Commitment file [default: <program>.commit]
        #[arg(long)]
        commitment: Option<PathBuf>,
        /// Prove a recorded trace (JSON or bincode) instead of tracing
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Public input, repeatable
        #[arg(long = "input", allow_hyphen_values = true)]
        inputs: Vec<i64>,
        /// Arguments passed to a traced executable
        #[arg(long, default_value = "")]
        args: String,
        /// Output file [default: <program>.proof]
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Check a proof against a published commitment
    Verify {
        commitment: PathBuf,
        proof: PathBuf,
        #[arg(long, default_value = DEFAULT_DOMAIN)]
        domain: String,
        #[arg(long = "input", allow_hyphen_values = true)]
        inputs: Vec<i64>,
        /// Require this final output
        #[arg(long)]
        expect_output: Option<u64>,
    },
    /// Write the AND/OR lookup table polynomials
    Lut {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Commit, prove and verify the built-in stack program
    Demo,
}

fn parse_kind(s: &str) -> Result<SourceKind, String> {
    s.parse()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => ProtocolConfig::load(path)?,
        None => ProtocolConfig::default(),
    };

    match cli.command {
        Commands::Commit { program, kind, out } => {
            cmd_commit(&config, &program, kind, out)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Prove {
            program,
            steps,
            domain,
            commitment,
            trace,
            inputs,
            args,
            out,
        } => {
            if let Some(steps) = steps {
                config.max_steps = steps;
                config.validate()?;
            }
            let request = ProveRequest {
                program,
                domain,
                commitment,
                trace,
                inputs,
                args,
                out,
            };
            cmd_prove(&config, request)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify {
            commitment,
            proof,
            domain,
            inputs,
            expect_output,
        } => cmd_verify(&config, &commitment, &proof, &domain, &inputs, expect_output),
        Commands::Lut { out_dir } => {
            cmd_lut(&config, &out_dir)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Demo => cmd_demo(&config),
    }
}

fn infer_kind(path: &Path) -> SourceKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("zs") => SourceKind::Stack,
        Some("s" | "S" | "asm") => SourceKind::Asm,
        _ => SourceKind::Bin,
    }
}

/// Bytes a program is committed as
fn code_bytes(path: &Path, kind: SourceKind) -> Result<Vec<u8>> {
    match kind {
        SourceKind::Stack => Ok(Program::load(path)?.to_bytes()),
        SourceKind::Asm | SourceKind::Bin => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn srs(config: &ProtocolConfig, powers: usize) -> Srs {
    Srs::deterministic(&config.srs_label, powers.max(config.blinding_powers()))
}

fn cmd_commit(
    config: &ProtocolConfig,
    program: &Path,
    kind: Option<SourceKind>,
    out: Option<PathBuf>,
) -> Result<()> {
    let kind = kind.unwrap_or_else(|| infer_kind(program));
    let code = code_bytes(program, kind)?;
    let srs = srs(config, code.len());
    let record = CommitmentRecord {
        source_kind: kind,
        code_size: code.len() as u64,
        code: commit_code(&srs, &code)?,
        srs_label: config.srs_label.clone(),
    };
    let out = out.unwrap_or_else(|| with_suffix(program, ".commit"));
    std::fs::write(&out, codec::write_commitment(&record))
        .with_context(|| format!("writing {}", out.display()))?;
    info!(kind = %kind, code_size = code.len(), out = %out.display(), "commitment written");
    println!("code_sha256: {}", hex::encode(record.code.code_hash));
    Ok(())
}

fn read_commitment(path: &Path) -> Result<CommitmentRecord> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading commitment {}", path.display()))?;
    codec::read_commitment(&text).with_context(|| format!("parsing commitment {}", path.display()))
}

struct ProveRequest {
    program: PathBuf,
    domain: String,
    commitment: Option<PathBuf>,
    trace: Option<PathBuf>,
    inputs: Vec<i64>,
    args: String,
    out: Option<PathBuf>,
}

fn cmd_prove(config: &ProtocolConfig, req: ProveRequest) -> Result<()> {
    let commitment_path = req
        .commitment
        .clone()
        .unwrap_or_else(|| with_suffix(&req.program, ".commit"));
    let record = read_commitment(&commitment_path)?;
    ensure!(
        record.srs_label == config.srs_label,
        "commitment uses SRS `{}` but the configuration uses `{}`",
        record.srs_label,
        config.srs_label
    );
    let code = code_bytes(&req.program, record.source_kind)?;
    ensure!(
        zktrace_prover::hash::sha256(&code) == record.code.code_hash,
        "{} does not match the committed code hash",
        req.program.display()
    );

    let trace = match (&req.trace, record.source_kind) {
        (Some(path), _) => ExecutionTrace::load(path)?,
        (None, SourceKind::Stack) => StackMachine::run(&Program::load(&req.program)?, &req.inputs)?,
        (None, _) => trace_executable(&req.program, &req.args, config)?,
    };
    info!(rows = trace.len(), "trace ready");

    let binding = SessionBinding::from_label(&req.domain, &req.inputs);
    let proof = prove(config, &code, &record.code, &binding, &trace)?;

    let out = req
        .out
        .unwrap_or_else(|| with_suffix(&req.program, ".proof"));
    std::fs::write(&out, codec::write_proof(&proof))
        .with_context(|| format!("writing {}", out.display()))?;
    println!("proof written to {} (final output {})", out.display(), proof.final_output);
    Ok(())
}

fn prove(
    config: &ProtocolConfig,
    code: &[u8],
    commitment: &CodeCommitment,
    binding: &SessionBinding,
    trace: &ExecutionTrace,
) -> Result<Proof> {
    let mut powers = code.len().max(padded_len(trace.len()));
    if trace.uses_bitwise() {
        powers = powers.max(LOOKUP_ROWS);
    }
    let srs = Arc::new(srs(config, powers));
    let mut prover = Prover::new(config.clone(), Arc::clone(&srs));
    if trace.uses_bitwise() {
        prover = prover.with_lookup_table(Arc::new(LookupTable::build(&srs)?));
    }
    Ok(prover.prove(commitment, binding, trace)?)
}

fn verifier(config: &ProtocolConfig, with_lookup: bool) -> Result<Verifier> {
    let powers = if with_lookup { LOOKUP_ROWS } else { 0 };
    let srs = Arc::new(srs(config, powers));
    let mut verifier = Verifier::new(config.clone(), Arc::clone(&srs))?;
    if with_lookup {
        verifier = verifier.with_lookup_commitments(*LookupTable::build(&srs)?.commitments());
    }
    Ok(verifier)
}

fn print_verdict(verdict: &Verdict) {
    match verdict {
        Verdict::Accept => println!("ACCEPT"),
        Verdict::Reject(reason) => println!("REJECT: {}", reason.code()),
    }
}

fn report(verdict: &Verdict) -> ExitCode {
    print_verdict(verdict);
    if verdict.is_accept() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn cmd_verify(
    config: &ProtocolConfig,
    commitment: &Path,
    proof: &Path,
    domain: &str,
    inputs: &[i64],
    expect_output: Option<u64>,
) -> Result<ExitCode> {
    let record = read_commitment(commitment)?;
    if record.srs_label != config.srs_label {
        bail!(
            "commitment uses SRS `{}` but the configuration uses `{}`",
            record.srs_label,
            config.srs_label
        );
    }
    let text = std::fs::read_to_string(proof)
        .with_context(|| format!("reading proof {}", proof.display()))?;
    let proof = codec::read_proof(&text).with_context(|| format!("parsing proof {}", proof.display()))?;

    let mut binding = SessionBinding::from_label(domain, inputs);
    if let Some(expected) = expect_output {
        binding = binding.with_expected_output(expected);
    }
    let verdict = verifier(config, proof.uses_lookup())?.verify(&record.code, &binding, &proof)?;
    Ok(report(&verdict))
}

fn cmd_lut(config: &ProtocolConfig, out_dir: &Path) -> Result<()> {
    let srs = srs(config, LOOKUP_ROWS);
    let table = LookupTable::build(&srs)?;
    codec::save_table_polynomials(out_dir, table.polynomials())?;
    for (name, commitment) in table.commitments().iter() {
        let bytes = zktrace_prover::field::to_bytes(&commitment.0);
        println!("{name}: {}", hex::encode(bytes));
    }
    info!(dir = %out_dir.display(), "lookup table written");
    Ok(())
}

fn cmd_demo(config: &ProtocolConfig) -> Result<ExitCode> {
    let program = Program::parse(DEMO_PROGRAM)?;
    print!("{program}");
    let code = program.to_bytes();
    let commitment = commit_code(&srs(config, code.len()), &code)?;
    let trace = StackMachine::run(&program, &[])?;

    let binding = SessionBinding::from_label("demo-session", &[]);
    let proof = prove(config, &code, &commitment, &binding, &trace)?;
    let verifier = verifier(config, proof.uses_lookup())?;

    println!("rows: {}, final output: {}", proof.trace_len, proof.final_output);
    print!("honest session: ");
    let honest = verifier.verify(&commitment, &binding, &proof)?;
    print_verdict(&honest);

    print!("replayed under another session: ");
    let replay = SessionBinding::from_label("other-session", &[]);
    let replayed = verifier.verify(&commitment, &replay, &proof)?;
    print_verdict(&replayed);

    if honest.is_accept() && !replayed.is_accept() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("demo produced an unexpected verdict");
        Ok(ExitCode::from(1))
    }
}
