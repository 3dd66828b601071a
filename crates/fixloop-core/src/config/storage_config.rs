//! Storage configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path. `None` opens an in-memory database.
    pub database_path: Option<String>,
    /// Read connections in the pool. Default: 4.
    pub read_pool_size: Option<usize>,
    /// Days of promoted pairs re-clustered per run. Default: 90.
    pub evidence_window_days: Option<u32>,
    /// Default page size for listings. Default: 50.
    pub page_size: Option<usize>,
}

impl StorageConfig {
    pub fn effective_read_pool_size(&self) -> usize {
        self.read_pool_size.unwrap_or(4)
    }

    pub fn effective_evidence_window_days(&self) -> u32 {
        self.evidence_window_days.unwrap_or(90)
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size.unwrap_or(50)
    }
}
