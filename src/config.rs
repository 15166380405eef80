//! Defaults and worker sizing for a [`Bcrypt`](crate::Bcrypt) handle.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::crypto::{DEFAULT_COST, MAX_COST, MIN_COST, Minor};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Handle configuration.
///
/// Loaded from JSON; every field is optional:
///
/// ```json
/// { "rounds": 12, "minor": "b", "worker_threads": 4 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Cost factor used when a call supplies none.
    rounds: u32,
    /// Minor revision used when a call supplies none.
    minor: Minor,
    /// Size of the fallback worker runtime; `None` lets tokio decide.
    worker_threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_COST,
            minor: Minor::B,
            worker_threads: None,
        }
    }
}

impl Config {
    pub fn new(
        rounds: u32,
        minor: Minor,
        worker_threads: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            rounds,
            minor,
            worker_threads,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON for
    /// this struct, or fails [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn minor(&self) -> Minor {
        self.minor
    }

    pub fn worker_threads(&self) -> Option<usize> {
        self.worker_threads
    }

    pub fn with_rounds(mut self, rounds: u32) -> Result<Self, ConfigError> {
        self.rounds = rounds;
        self.validate()?;
        Ok(self)
    }

    pub fn with_minor(mut self, minor: Minor) -> Self {
        self.minor = minor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_COST..=MAX_COST).contains(&self.rounds) {
            return Err(ConfigError::Invalid(format!(
                "rounds must be between {MIN_COST} and {MAX_COST}"
            )));
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::Invalid("worker_threads must be >= 1".into()));
        }
        Ok(())
    }
}
