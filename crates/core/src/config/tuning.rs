//! Runtime tuning loaded from an optional TOML file.
//!
//! Every field has a default, so an absent file or an empty table yields
//! [`Tuning::default`]. Individual knobs can be overridden from env after
//! loading.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use sweeper_chain::GasSettings;
use tracing::info;

/// Concurrency, timeout and gas knobs for the sweep loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuning {
    /// Maximum (wallet, token) pairs processed at once
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Deadline for one pair, from balance read to submission
    #[serde(default = "default_pair_timeout_ms")]
    pub pair_timeout_ms: u64,

    /// Deadline for a single RPC request
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Deadline for a custody request, including activity polling
    #[serde(default = "default_custody_timeout_ms")]
    pub custody_timeout_ms: u64,

    /// Stop after this many passes (unset = run forever)
    #[serde(default)]
    pub max_iterations: Option<u64>,

    /// Gas pricing and limit settings
    #[serde(default)]
    pub gas: GasSettings,
}

fn default_max_in_flight() -> usize {
    16
}
fn default_pair_timeout_ms() -> u64 {
    120_000
}
fn default_rpc_timeout_ms() -> u64 {
    10_000
}
fn default_custody_timeout_ms() -> u64 {
    30_000
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            pair_timeout_ms: default_pair_timeout_ms(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            custody_timeout_ms: default_custody_timeout_ms(),
            max_iterations: None,
            gas: GasSettings::default(),
        }
    }
}

impl Tuning {
    /// Load tuning from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::TuningFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let tuning: Self = toml::from_str(&content).map_err(|e| ConfigError::TuningFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), "Loaded tuning file");
        Ok(tuning)
    }

    pub fn pair_timeout(&self) -> Duration {
        Duration::from_millis(self.pair_timeout_ms)
    }
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
    pub fn custody_timeout(&self) -> Duration {
        Duration::from_millis(self.custody_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let tuning = Tuning::default();
        assert_eq!(tuning.max_in_flight, 16);
        assert_eq!(tuning.pair_timeout(), Duration::from_secs(120));
        assert_eq!(tuning.rpc_timeout(), Duration::from_secs(10));
        assert_eq!(tuning.custody_timeout(), Duration::from_secs(30));
        assert!(tuning.max_iterations.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let tuning: Tuning = toml::from_str(
            r#"
            max_in_flight = 4
            max_iterations = 3

            [gas]
            limit_multiplier = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(tuning.max_in_flight, 4);
        assert_eq!(tuning.max_iterations, Some(3));
        assert_eq!(tuning.gas.limit_multiplier, 1.5);
        // untouched fields keep defaults
        assert_eq!(tuning.rpc_timeout_ms, 10_000);
        assert_eq!(tuning.gas.max_gas_price_gwei, 200.0);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pair_timeout_ms = 5000").unwrap();
        let tuning = Tuning::from_file(file.path()).unwrap();
        assert_eq!(tuning.pair_timeout(), Duration::from_secs(5));

        let err = Tuning::from_file("/nonexistent/sweeper.toml").unwrap_err();
        assert!(matches!(err, ConfigError::TuningFile { .. }));
    }
}
