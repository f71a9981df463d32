//! Daemon configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use agora_governance::GovernanceConfig;
use agora_store_lmdb::DEFAULT_MAP_SIZE;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Parse(String),
}

/// Configuration for the `agora` binary.
///
/// Can be loaded from a TOML file via [`AgoraConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgoraConfig {
    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// TOML file with balance snapshots read by the snapshot oracle.
    #[serde(default = "default_balances_file")]
    pub balances_file: PathBuf,

    /// JSON-lines file every committed state delta is appended to.
    #[serde(default = "default_journal_file")]
    pub journal_file: PathBuf,

    /// JSON-lines outbox for effects of executed extension proposals.
    #[serde(default = "default_effects_file")]
    pub effects_file: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Genesis governance configuration. Only used the first time a data
    /// directory is opened; afterwards it changes through proposals.
    #[serde(default)]
    pub governance: GovernanceConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./agora_data")
}

fn default_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

fn default_balances_file() -> PathBuf {
    PathBuf::from("./balances.toml")
}

fn default_journal_file() -> PathBuf {
    PathBuf::from("./agora_data/journal.jsonl")
}

fn default_effects_file() -> PathBuf {
    PathBuf::from("./agora_data/effects.jsonl")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl AgoraConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

impl Default for AgoraConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            balances_file: default_balances_file(),
            journal_file: default_journal_file(),
            effects_file: default_effects_file(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            governance: GovernanceConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_governance::VoteWeightPolicy;
    use agora_types::TokenAmount;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = AgoraConfig::default();
        let toml_str = config.to_toml_string().expect("serializable");
        let parsed = AgoraConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = AgoraConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.data_dir, PathBuf::from("./agora_data"));
        assert_eq!(config.log_format, "human");
        assert_eq!(config.governance.quorum_percentage, 4);
        assert_eq!(config.governance.majority_percentage, 51);
        assert_eq!(config.governance.voting_period_secs, 7 * 24 * 3600);
        assert_eq!(config.governance.execution_delay_secs, 2 * 24 * 3600);
        assert_eq!(
            config.governance.min_proposal_threshold,
            TokenAmount::new(1_000_000)
        );
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            log_level = "debug"

            [governance]
            quorum_percentage = 10
            vote_weight_policy = "at_proposal_start"
        "#;
        let config = AgoraConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.governance.quorum_percentage, 10);
        assert_eq!(
            config.governance.vote_weight_policy,
            VoteWeightPolicy::AtProposalStart
        );
        assert_eq!(config.governance.majority_percentage, 51); // default
    }

    #[test]
    fn missing_file_returns_read_error() {
        let result = AgoraConfig::from_toml_file(Path::new("/nonexistent/agora.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
