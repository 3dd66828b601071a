//! Codemod generation and replay configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the replay sandbox.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CodemodConfig {
    /// Wall-clock limit per replay case in milliseconds. Default: 2000.
    pub replay_timeout_ms: Option<u64>,
    /// Maximum transformed output size per case in bytes. Default: 1 MiB.
    pub output_budget_bytes: Option<usize>,
    /// Maximum replay cases drawn from evidence. Default: 50.
    pub max_replay_cases: Option<usize>,
}

impl CodemodConfig {
    pub fn effective_replay_timeout_ms(&self) -> u64 {
        self.replay_timeout_ms.unwrap_or(2_000)
    }

    pub fn effective_output_budget_bytes(&self) -> usize {
        self.output_budget_bytes.unwrap_or(1024 * 1024)
    }

    pub fn effective_max_replay_cases(&self) -> usize {
        self.max_replay_cases.unwrap_or(50)
    }
}
