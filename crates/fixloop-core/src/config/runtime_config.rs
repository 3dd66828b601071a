//! Worker runtime configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the partitioned event workers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker partitions. Default: 4.
    pub workers: Option<usize>,
    /// Bounded queue depth per worker. Default: 1024.
    pub channel_capacity: Option<usize>,
    /// `source` written on outbound envelopes. Default: "fixloop".
    pub source_name: Option<String>,
}

impl RuntimeConfig {
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or(4).max(1)
    }

    pub fn effective_channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or(1024)
    }

    pub fn effective_source_name(&self) -> String {
        self.source_name.clone().unwrap_or_else(|| "fixloop".to_string())
    }
}
