use anyhow::{Context, anyhow};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::error;

use crate::auction::types::MAX_WEIGHT;
use crate::error::{Error, Result};

/// Job configuration consumed by the step engine and the round driver
///
/// The tie-break rule is fixed to "smallest identity" and is not configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Minimum price raise per bid, must be strictly positive
    pub epsilon: Decimal,
    /// Hard ceiling on executed rounds; `0` reports `BudgetExceeded` immediately
    pub max_rounds: u64,
}

impl JobConfig {
    pub fn new(epsilon: Decimal, max_rounds: u64) -> Result<Self> {
        let config = Self { epsilon, max_rounds };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.epsilon <= Decimal::ZERO {
            return Err(Error::InvalidConfiguration(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if self.epsilon > MAX_WEIGHT {
            return Err(Error::InvalidConfiguration(format!(
                "epsilon {} exceeds the weight limit {}",
                self.epsilon, MAX_WEIGHT
            )));
        }
        Ok(())
    }

    pub fn with_max_rounds(mut self, max_rounds: u64) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

/// Evaluate a pkl file to JSON through the `pkl` CLI and deserialize it
pub fn load_pkl<T: DeserializeOwned>(config_path: impl AsRef<Path>) -> anyhow::Result<T> {
    let config_path = config_path.as_ref();
    let output = Command::new("pkl")
        .arg("eval")
        .arg("-f")
        .arg("json")
        .arg(config_path)
        .output()
        .context("Failed to execute pkl command")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("pkl failed: {}", stderr);
        return Err(anyhow!("pkl failed: {}", stderr));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&json_str).context("Failed to parse config json")
}

pub fn load_json<T: DeserializeOwned>(config_path: impl AsRef<Path>) -> anyhow::Result<T> {
    let config_path = config_path.as_ref();
    let json = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config {}", config_path.display()))?;
    serde_json::from_str(&json).context("Failed to parse config json")
}

/// Load any config document, choosing pkl or plain JSON by file extension
pub fn load_document<T: DeserializeOwned>(config_path: impl AsRef<Path>) -> anyhow::Result<T> {
    let config_path = config_path.as_ref();
    match config_path.extension().and_then(|e| e.to_str()) {
        Some("pkl") => load_pkl(config_path),
        _ => load_json(config_path),
    }
}

/// Load and validate a [`JobConfig`]
pub fn load_config(config_path: impl AsRef<Path>) -> anyhow::Result<JobConfig> {
    let config: JobConfig = load_document(config_path)?;
    config.validate()?;
    Ok(config)
}
