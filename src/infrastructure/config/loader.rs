//! Layered configuration loading with figment.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    /// Log level is not one tracing understands.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Log format is neither json nor pretty.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Rotation is not daily, hourly or never.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    /// No tool could run in a round.
    #[error("Invalid max_tools_per_round: {0}. Must be at least 1")]
    InvalidToolsPerRound(usize),

    /// A probability-like setting left the unit interval.
    #[error("Invalid {field}: {value}. Must be between 0 and 1")]
    OutOfUnitRange {
        /// Setting name.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// Similarity threshold is zero or above one.
    #[error("Invalid similarity_threshold: {0}. Must be greater than 0 and at most 1")]
    InvalidSimilarityThreshold(f64),

    /// A confidence weight is negative.
    #[error("Invalid {field}: {value}. Cannot be negative")]
    NegativeWeight {
        /// Setting name.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// Follow-up page size exceeds the maximum.
    #[error(
        "Invalid pagination limits: followup_limit ({0}) must not exceed max_limit ({1})"
    )]
    InvalidPagination(u64, u64),

    /// Admin links need a base URL.
    #[error("Admin base URL cannot be empty")]
    EmptyAdminBaseUrl,

    /// Budget validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .investigator/config.yaml (project config)
    /// 3. .investigator/local.yaml (local overrides, optional)
    /// 4. Environment variables (INVESTIGATOR_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".investigator/config.yaml"))
            .merge(Yaml::file(".investigator/local.yaml"))
            .merge(Env::prefixed("INVESTIGATOR_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Zero rounds or a zero call budget are accepted: they produce an
    /// immediately aborted, incomplete investigation rather than an error.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let budget = config.budget.to_budget();
        if budget.max_tools_per_round == 0 {
            return Err(ConfigError::InvalidToolsPerRound(0));
        }
        budget
            .validate()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        let parser = &config.parser;
        for (field, value) in [
            ("ambiguity_threshold", parser.ambiguity_threshold),
            ("ambiguity_penalty", parser.ambiguity_penalty),
            ("unknown_confidence", config.synthesis.unknown_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { field, value });
            }
        }

        let synthesis = &config.synthesis;
        if !(synthesis.similarity_threshold > 0.0 && synthesis.similarity_threshold <= 1.0) {
            return Err(ConfigError::InvalidSimilarityThreshold(
                synthesis.similarity_threshold,
            ));
        }
        for (field, value) in [
            ("specificity_weight", synthesis.specificity_weight),
            ("corroboration_weight", synthesis.corroboration_weight),
            ("consistency_bonus", synthesis.consistency_bonus),
            ("contradiction_penalty", synthesis.contradiction_penalty),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NegativeWeight { field, value });
            }
        }

        let selection = &config.selection;
        if selection.followup_limit > selection.max_limit {
            return Err(ConfigError::InvalidPagination(
                selection.followup_limit,
                selection.max_limit,
            ));
        }

        if config.tools.admin_base_url.trim().is_empty() {
            return Err(ConfigError::EmptyAdminBaseUrl);
        }

        Ok(())
    }
}
