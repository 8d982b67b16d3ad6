//! Engine configuration
//!
//! [`StmConfig`] collects every tunable of the engine. It is normally
//! built through the root crate's `StmBuilder`, but can also be loaded
//! from JSON:
//!
//! ```
//! use mvstm_core::StmConfig;
//!
//! let config = StmConfig::from_json(r#"{ "history_depth": 2 }"#).unwrap();
//! assert_eq!(config.history_depth, 2);
//! assert_eq!(config.max_retries, StmConfig::default().max_retries);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds an unusable value
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The JSON document could not be parsed
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Commit lock acquisition bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPolicyConfig {
    /// Spins on a contended lock before giving up on the attempt
    pub spin_attempts_per_lock: u32,
    /// Whole write-set attempts after the first one fails
    pub retry_count: u32,
}

impl LockPolicyConfig {
    /// Give up on the first contended lock
    pub const FAIL_FAST: LockPolicyConfig = LockPolicyConfig {
        spin_attempts_per_lock: 0,
        retry_count: 0,
    };

    /// Spin briefly, then retry the whole write-set a bounded number of times
    pub const FAIL_FAST_BUT_RETRY: LockPolicyConfig = LockPolicyConfig {
        spin_attempts_per_lock: 10,
        retry_count: 10,
    };
}

impl Default for LockPolicyConfig {
    fn default() -> Self {
        Self::FAIL_FAST_BUT_RETRY
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StmConfig {
    /// Commit lock acquisition bounds
    pub lock_policy: LockPolicyConfig,

    /// Committed versions retained per object
    ///
    /// A reader whose snapshot predates every retained version gets
    /// `LoadTooOldVersion`. `1` keeps only the latest version.
    pub history_depth: usize,

    /// Spins a load waits for a concurrent publish before `LoadLocked`
    pub load_lock_spins: u32,

    /// Attempts the retry-loop driver makes before giving up on
    /// recoverable failures
    pub max_retries: u32,

    /// Start template transactions read-only and upgrade on first write
    pub speculative_readonly: bool,
}

impl StmConfig {
    /// Default committed versions retained per object
    pub const DEFAULT_HISTORY_DEPTH: usize = 8;

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: StmConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unusable values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "history_depth",
                reason: "at least one committed version must be retained".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                reason: "the driver needs at least one attempt".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for StmConfig {
    fn default() -> Self {
        StmConfig {
            lock_policy: LockPolicyConfig::default(),
            history_depth: Self::DEFAULT_HISTORY_DEPTH,
            load_lock_spins: 64,
            max_retries: 1000,
            speculative_readonly: true,
        }
    }
}
