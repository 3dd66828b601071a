//! Shared constants for the fixloop pipeline.

/// Version tag of the canonical pattern signature format.
pub const SIGNATURE_VERSION: &str = "sig-v1";

/// Version tag of the codemod transform signature.
pub const TRANSFORM_SIGNATURE_VERSION: &str = "tx-v1";

/// Format identifier every generated codemod document declares.
pub const CODEMOD_FORMAT: &str = "fixloop-codemod/v1";

/// Name of the single entry point a codemod exposes.
pub const CODEMOD_ENTRY_NAME: &str = "transform";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "fixloop.toml";

/// Environment variable controlling log filters.
pub const LOG_ENV_VAR: &str = "FIXLOOP_LOG";

/// Maximum number of keywords that contribute to a pattern signature.
pub const SIGNATURE_KEYWORD_LIMIT: usize = 20;

/// Default pattern domain when a pair carries no language hint.
pub const DEFAULT_DOMAIN: &str = "general";
