//! Event correlation configuration.

use serde::{Deserialize, Serialize};

/// Tool configuration files whose modification suggests the finding went
/// away because the rule was reconfigured, not fixed.
pub const DEFAULT_CONFIG_FILE_NAMES: &[&str] = &[
    ".eslintrc",
    ".eslintrc.js",
    ".eslintrc.json",
    ".eslintrc.yml",
    "eslint.config.js",
    ".prettierrc",
    ".pylintrc",
    "pylintrc",
    "setup.cfg",
    "tox.ini",
    ".flake8",
    "pyproject.toml",
    "ruff.toml",
    ".ruff.toml",
    "mypy.ini",
    ".rubocop.yml",
    "clippy.toml",
    ".clippy.toml",
    "rustfmt.toml",
    ".golangci.yml",
    ".golangci.yaml",
    "checkstyle.xml",
    "tsconfig.json",
    ".semgrep.yml",
    ".editorconfig",
];

/// Configuration for pairing findings with fixes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Hours after observation within which a fix counts as temporal. Default: 72.
    pub temporal_window_hours: Option<u32>,
    /// Subsequent PRs in which a reappearing finding counts as reintroduced. Default: 5.
    pub reintroduction_pr_window: Option<u32>,
    /// Overrides the built-in list of tool config file names.
    #[serde(default)]
    pub config_file_names: Vec<String>,
}

impl CorrelationConfig {
    pub fn effective_temporal_window_hours(&self) -> u32 {
        self.temporal_window_hours.unwrap_or(72)
    }

    pub fn effective_reintroduction_pr_window(&self) -> u32 {
        self.reintroduction_pr_window.unwrap_or(5)
    }

    pub fn effective_config_file_names(&self) -> Vec<String> {
        if self.config_file_names.is_empty() {
            DEFAULT_CONFIG_FILE_NAMES.iter().map(|s| s.to_string()).collect()
        } else {
            self.config_file_names.clone()
        }
    }
}
