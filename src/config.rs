//! Protocol parameters shared by prover, verifier and tracer

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Number of opcode openings sampled per proof
pub const DEFAULT_OPCODE_SAMPLES: usize = 4;

/// Number of adjacent-row openings sampled per proof
pub const DEFAULT_ROW_SAMPLES: usize = 4;

/// Degree of the session blinding polynomial
pub const DEFAULT_BLINDING_DEGREE: usize = 8;

/// Blinding coefficients are indexed by a single byte
pub const MAX_BLINDING_DEGREE: usize = u8::MAX as usize;

/// Label the development SRS is derived from
pub const DEFAULT_SRS_LABEL: &str = "zktrace-dev-srs-v1";

/// Protocol configuration.
///
/// The first three fields are protocol parameters: a prover and a verifier
/// built with different values will disagree on every proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub opcode_samples: usize,
    pub row_samples: usize,
    pub blinding_degree: usize,
    pub srs_label: String,
    /// Tracer step budget
    pub max_steps: usize,
    /// Tracer per-request timeout in milliseconds
    pub step_timeout_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            opcode_samples: DEFAULT_OPCODE_SAMPLES,
            row_samples: DEFAULT_ROW_SAMPLES,
            blinding_degree: DEFAULT_BLINDING_DEGREE,
            srs_label: DEFAULT_SRS_LABEL.to_string(),
            max_steps: 200,
            step_timeout_ms: 10_000,
        }
    }
}

impl ProtocolConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.srs_label.is_empty() {
            bail!("srs_label must not be empty");
        }
        if self.max_steps == 0 {
            bail!("max_steps must be at least 1");
        }
        if self.blinding_degree > MAX_BLINDING_DEGREE {
            bail!(
                "blinding_degree {} exceeds {}",
                self.blinding_degree,
                MAX_BLINDING_DEGREE
            );
        }
        Ok(())
    }

    /// Number of SRS powers needed to commit the session blinding polynomial
    pub fn blinding_powers(&self) -> usize {
        self.blinding_degree + 1
    }
}
