//! GDB machine-interface driver

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::{Debugger, StepOutcome, TraceError};

const PROMPT: &str = "(gdb)";

/// A `gdb --interpreter=mi` session stopped inside the inferior
pub struct GdbMi {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    timeout: Duration,
}

impl GdbMi {
    /// Start gdb on `executable` and run it to `main`
    pub fn launch(executable: &Path, args: &str, timeout: Duration) -> Result<Self, TraceError> {
        let mut child = Command::new("gdb")
            .args(["-q", "--interpreter=mi"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(TraceError::Spawn)?;
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => return Err(TraceError::Disconnected),
        };

        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut gdb = Self {
            child,
            stdin,
            lines,
            timeout,
        };
        gdb.read_until(|line| line.starts_with(PROMPT))?;
        gdb.command(&format!(
            "-file-exec-and-symbols \"{}\"",
            escape(&executable.display().to_string())
        ))?;
        if !args.is_empty() {
            gdb.command(&format!("-exec-arguments {args}"))?;
        }
        gdb.command("-gdb-set pagination off")?;
        gdb.command("-break-insert -f main")?;
        let stop = gdb.execute("-exec-run")?;
        if is_exit(&stop) {
            return Err(TraceError::ExitedBeforeMain);
        }
        debug!(executable = %executable.display(), "stopped at main");
        Ok(gdb)
    }

    fn recv(&self) -> Result<String, TraceError> {
        match self.lines.recv_timeout(self.timeout) {
            Ok(line) => {
                trace!(%line, "gdb");
                Ok(line)
            }
            Err(RecvTimeoutError::Timeout) => Err(TraceError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(TraceError::Disconnected),
        }
    }

    /// Lines up to and including the first one matching `done`
    fn read_until(&self, done: impl Fn(&str) -> bool) -> Result<Vec<String>, TraceError> {
        let mut out = Vec::new();
        loop {
            let line = self.recv()?;
            let finished = done(&line);
            out.push(line);
            if finished {
                return Ok(out);
            }
        }
    }

    fn send(&mut self, command: &str) -> Result<(), TraceError> {
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Run a synchronous command; returns its output up to the result record
    fn command(&mut self, command: &str) -> Result<Vec<String>, TraceError> {
        self.send(command)?;
        let out = self.read_until(|line| line.starts_with('^'))?;
        self.read_until(|line| line.starts_with(PROMPT))?;
        match out.last() {
            Some(result) if result.starts_with("^error") => Err(TraceError::Command {
                command: command.to_string(),
                response: result.clone(),
            }),
            _ => Ok(out),
        }
    }

    /// Run an execution command and wait for the inferior to stop
    fn execute(&mut self, command: &str) -> Result<String, TraceError> {
        self.command(command)?;
        let stopped = self.read_until(|line| line.starts_with("*stopped"))?;
        self.read_until(|line| line.starts_with(PROMPT))?;
        Ok(stopped.last().cloned().unwrap_or_default())
    }

    /// Console stream output of a CLI command
    fn console(&mut self, cli: &str) -> Result<Vec<String>, TraceError> {
        let out = self.command(&format!("-interpreter-exec console \"{}\"", escape(cli)))?;
        Ok(out
            .iter()
            .filter_map(|line| line.strip_prefix('~'))
            .map(unquote)
            .collect())
    }
}

impl Debugger for GdbMi {
    fn current_instruction(&mut self) -> Result<String, TraceError> {
        let out = self.console("x/i $pc")?;
        Ok(out
            .iter()
            .find(|line| line.contains("=>"))
            .or_else(|| out.first())
            .cloned()
            .unwrap_or_default())
    }

    fn step_instruction(&mut self) -> Result<StepOutcome, TraceError> {
        let stop = self.execute("-exec-step-instruction")?;
        if is_exit(&stop) {
            Ok(StepOutcome::Exited)
        } else if stop.contains("reason=\"end-stepping-range\"") {
            Ok(StepOutcome::Stopped)
        } else {
            debug!(%stop, "unexpected stop");
            Ok(StepOutcome::Running)
        }
    }

    fn read_register(&mut self, index: u8) -> Result<u64, TraceError> {
        let out = self.command(&format!("-data-evaluate-expression $x{index}"))?;
        out.last()
            .and_then(|line| mi_field(line, "value"))
            .and_then(|value| parse_value(&value))
            .ok_or(TraceError::Register(index))
    }
}

impl Drop for GdbMi {
    fn drop(&mut self) {
        if self.send("-gdb-exit").is_err() {
            warn!("gdb already gone");
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn is_exit(stop: &str) -> bool {
    stop.contains("reason=\"exited")
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Decode an MI c-string: `"a\tb\n"` -> `a<TAB>b<LF>`
fn unquote(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Value of `key="..."` in a result record
fn mi_field(record: &str, key: &str) -> Option<String> {
    let start = record.find(&format!("{key}=\""))? + key.len() + 1;
    let rest = &record[start..];
    let mut end = 1;
    let bytes = rest.as_bytes();
    while end < bytes.len() {
        match bytes[end] {
            b'\\' => end += 2,
            b'"' => return Some(unquote(&rest[..=end])),
            _ => end += 1,
        }
    }
    None
}

/// Register values print as signed decimal or hex
fn parse_value(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok();
    }
    value
        .parse::<u64>()
        .ok()
        .or_else(|| value.parse::<i64>().ok().map(|v| v as u64))
}
