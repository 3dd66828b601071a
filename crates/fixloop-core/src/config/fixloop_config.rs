//! Top-level fixloop configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    ClusteringConfig, CodemodConfig, CorrelationConfig, LifecycleConfig, RuntimeConfig,
    ScoringConfig, StorageConfig,
};
use crate::constants::PROJECT_CONFIG_FILE;
use crate::errors::ConfigError;

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution: compiled defaults, then the project's `fixloop.toml` when
/// present, then `FIXLOOP_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FixloopConfig {
    pub scoring: ScoringConfig,
    pub correlation: CorrelationConfig,
    pub clustering: ClusteringConfig,
    pub lifecycle: LifecycleConfig,
    pub codemod: CodemodConfig,
    pub storage: StorageConfig,
    pub runtime: RuntimeConfig,
}

impl FixloopConfig {
    /// Load `fixloop.toml` under `root`, apply environment overrides and
    /// validate. A missing file means defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(PROJECT_CONFIG_FILE);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML string. Unknown keys are ignored.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Validate the configuration values.
    pub fn validate(config: &FixloopConfig) -> Result<(), ConfigError> {
        let unit_fields = [
            ("scoring.promotion_threshold", config.scoring.promotion_threshold),
            ("scoring.formatter_batch_ratio", config.scoring.formatter_batch_ratio),
            ("clustering.join_threshold", config.clustering.join_threshold),
            ("clustering.dedup_threshold", config.clustering.dedup_threshold),
            ("clustering.near_threshold_band", config.clustering.near_threshold_band),
            ("lifecycle.provisional_threshold", config.lifecycle.provisional_threshold),
            ("lifecycle.validated_threshold", config.lifecycle.validated_threshold),
            ("lifecycle.reward_ema_alpha", config.lifecycle.reward_ema_alpha),
        ];
        for (field, value) in unit_fields {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(invalid(field, "must be between 0.0 and 1.0"));
                }
            }
        }
        if let Some(v) = config.lifecycle.low_reward_threshold {
            if !(-1.0..=1.0).contains(&v) {
                return Err(invalid("lifecycle.low_reward_threshold", "must be between -1.0 and 1.0"));
            }
        }
        if config.lifecycle.effective_provisional_threshold()
            > config.lifecycle.effective_validated_threshold()
        {
            return Err(invalid(
                "lifecycle.provisional_threshold",
                "must not exceed lifecycle.validated_threshold",
            ));
        }
        if config.lifecycle.min_frequency == Some(0) {
            return Err(invalid("lifecycle.min_frequency", "must be greater than 0"));
        }
        if config.codemod.replay_timeout_ms == Some(0) {
            return Err(invalid("codemod.replay_timeout_ms", "must be greater than 0"));
        }
        if config.runtime.workers == Some(0) {
            return Err(invalid("runtime.workers", "must be greater than 0"));
        }
        Ok(())
    }

    /// Pattern: `FIXLOOP_<SECTION>_<FIELD>`. Unparseable values are ignored.
    fn apply_env_overrides(&mut self) {
        env_parse("FIXLOOP_SCORING_PROMOTION_THRESHOLD", &mut self.scoring.promotion_threshold);
        env_parse("FIXLOOP_CLUSTERING_DEDUP_THRESHOLD", &mut self.clustering.dedup_threshold);
        env_parse("FIXLOOP_LIFECYCLE_VALIDATED_THRESHOLD", &mut self.lifecycle.validated_threshold);
        env_parse("FIXLOOP_RUNTIME_WORKERS", &mut self.runtime.workers);
        env_parse("FIXLOOP_STORAGE_DATABASE_PATH", &mut self.storage.database_path);
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, slot: &mut Option<T>) {
    if let Ok(val) = std::env::var(key) {
        if let Ok(v) = val.parse::<T>() {
            *slot = Some(v);
        }
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationFailed {
        field: field.to_string(),
        message: message.to_string(),
    }
}
