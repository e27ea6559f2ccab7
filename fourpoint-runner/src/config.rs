//! Application configuration loaded from TOML.
//!
//! ```toml
//! [fetch]
//! workers = 8
//! max_retries = 2
//!
//! [[rules]]
//! type = "volume_confirmed_breakout"
//!
//! [ranking]
//! top_n = 10
//! ```
//!
//! Every section is optional. A missing file yields [`AppConfig::default`].

use crate::orchestrator::OrchestratorConfig;
use crate::ranking::RankingConfig;
use fourpoint_core::data::{RetryPolicy, SessionConfig};
use fourpoint_core::rules::{RuleConfigError, RuleSpec, SignalEvaluator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("[{section}] {field} must be greater than zero")]
    Zero {
        section: &'static str,
        field: &'static str,
    },

    #[error("[ranking] {field} = {value} must be finite and non-negative")]
    Threshold { field: &'static str, value: f64 },

    #[error(transparent)]
    Rule(#[from] RuleConfigError),
}

// ─── Fetch ───────────────────────────────────────────────────────────

/// Network and worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Worker pool width.
    pub workers: usize,
    pub per_call_timeout_secs: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Progress is reported every Nth completed job.
    pub progress_every: usize,
    pub breaker_cooldown_secs: u64,
    pub user_agent: String,
    /// Symbols per realtime request.
    pub realtime_batch: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            per_call_timeout_secs: 10,
            max_retries: 3,
            backoff_base_ms: 500,
            progress_every: 10,
            breaker_cooldown_secs: 30 * 60,
            user_agent: fourpoint_core::data::provider::DEFAULT_USER_AGENT.to_string(),
            realtime_batch: 50,
        }
    }
}

impl FetchConfig {
    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_secs(self.per_call_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_base_ms))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeout: self.per_call_timeout(),
            retry: self.retry_policy(),
            breaker_cooldown: Duration::from_secs(self.breaker_cooldown_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            workers: self.workers,
            per_call_timeout: self.per_call_timeout(),
            retry: self.retry_policy(),
            progress_every: self.progress_every,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let zero = |field| ConfigError::Zero {
            section: "fetch",
            field,
        };
        if self.workers == 0 {
            return Err(zero("workers"));
        }
        if self.per_call_timeout_secs == 0 {
            return Err(zero("per_call_timeout_secs"));
        }
        if self.progress_every == 0 {
            return Err(zero("progress_every"));
        }
        if self.realtime_batch == 0 {
            return Err(zero("realtime_batch"));
        }
        Ok(())
    }
}

// ─── Top level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    /// Ordered rule list; the first rule that fires names the verdict.
    pub rules: Vec<RuleSpec>,
    pub ranking: RankingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            rules: RuleSpec::default_set(),
            ranking: RankingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate `path`; a file that does not exist means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), rules = config.rules.len(), "config loaded");
        Ok(config)
    }

    /// Same as [`AppConfig::load`], with `None` meaning defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fetch.validate()?;
        if self.rules.is_empty() {
            return Err(RuleConfigError::EmptyRuleSet.into());
        }
        for spec in &self.rules {
            spec.validate()?;
        }
        self.ranking.validate()
    }

    pub fn evaluator(&self) -> Result<SignalEvaluator, ConfigError> {
        Ok(SignalEvaluator::from_specs(&self.rules)?)
    }
}
