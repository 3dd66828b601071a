//! Pattern scoring and lifecycle configuration.

use serde::{Deserialize, Serialize};

/// Configuration for pattern confidence and lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Member count at which the frequency factor saturates. Default: 5.
    pub min_frequency: Option<u32>,
    /// Confidence for candidate → provisional. Default: 0.60.
    pub provisional_threshold: Option<f64>,
    /// Confidence for provisional → validated. Default: 0.75.
    pub validated_threshold: Option<f64>,
    /// Members required for candidate → provisional. Default: 3.
    pub min_members: Option<u32>,
    /// Consecutive runs at the validated bar before promotion. Default: 2.
    pub sustained_runs_required: Option<u32>,
    /// Repeated violations that deprecate a pattern. Default: 3.
    pub repeated_violation_limit: Option<u32>,
    /// Reward average below which a pattern is deprecated. Default: -0.20.
    pub low_reward_threshold: Option<f64>,
    /// Outcomes observed before the reward average is trusted. Default: 5.
    pub min_reward_observations: Option<u32>,
    /// Smoothing factor of the reward moving average. Default: 0.30.
    pub reward_ema_alpha: Option<f64>,
}

impl LifecycleConfig {
    pub fn effective_min_frequency(&self) -> u32 {
        self.min_frequency.unwrap_or(5)
    }

    pub fn effective_provisional_threshold(&self) -> f64 {
        self.provisional_threshold.unwrap_or(0.60)
    }

    pub fn effective_validated_threshold(&self) -> f64 {
        self.validated_threshold.unwrap_or(0.75)
    }

    pub fn effective_min_members(&self) -> u32 {
        self.min_members.unwrap_or(3)
    }

    pub fn effective_sustained_runs_required(&self) -> u32 {
        self.sustained_runs_required.unwrap_or(2)
    }

    pub fn effective_repeated_violation_limit(&self) -> u32 {
        self.repeated_violation_limit.unwrap_or(3)
    }

    pub fn effective_low_reward_threshold(&self) -> f64 {
        self.low_reward_threshold.unwrap_or(-0.20)
    }

    pub fn effective_min_reward_observations(&self) -> u32 {
        self.min_reward_observations.unwrap_or(5)
    }

    pub fn effective_reward_ema_alpha(&self) -> f64 {
        self.reward_ema_alpha.unwrap_or(0.30)
    }
}
