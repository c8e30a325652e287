//! Pipeline configuration.
//!
//! Every section is defaulted, so an empty TOML document is a valid config.
//!
//! ```toml
//! [orchestrator]
//! max_concurrent = 4
//! task_timeout_ms = 30000
//!
//! [orchestrator.retry]
//! max_attempts = 3
//! base_delay_ms = 200
//! max_delay_ms = 5000
//!
//! [confidence]
//! review_threshold = 0.7
//!
//! [completeness]
//! required_weight = 0.7
//! optional_weight = 0.3
//!
//! [resolution]
//! max_rounds = 3
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::confidence::ConfidenceConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::resolver::ResolutionPolicy;
use crate::validator::CompletenessWeights;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub orchestrator: OrchestratorConfig,
    pub confidence: ConfidenceConfig,
    pub completeness: CompletenessWeights,
    pub resolution: ResolutionPolicy,
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let orchestrator = &self.orchestrator;
        if orchestrator.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.max_concurrent must be at least 1".into(),
            ));
        }
        if orchestrator.task_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.task_timeout_ms must be positive".into(),
            ));
        }
        if orchestrator.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.retry.max_attempts must be at least 1".into(),
            ));
        }

        let threshold = self.confidence.review_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence.review_threshold must be within [0, 1], got {threshold}"
            )));
        }

        let weights = &self.completeness;
        if weights.required_weight < 0.0 || weights.optional_weight < 0.0 {
            return Err(ConfigError::Invalid(
                "completeness weights must not be negative".into(),
            ));
        }
        let sum = weights.required_weight + weights.optional_weight;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "completeness weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }
}
