//! FixloopErrorCode trait for boundary conversion.

/// Every error enum implements this to expose a stable, structured error
/// code to callers outside the process (CLI, HTTP surface, bus consumers).
pub trait FixloopErrorCode {
    /// Returns the error code string (e.g., "VALIDATION_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted boundary string: `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

// Error code constants for the process boundary.
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const UNKNOWN_EVENT_TYPE: &str = "UNKNOWN_EVENT_TYPE";
pub const SCORING_ERROR: &str = "SCORING_ERROR";
pub const CLUSTERING_ERROR: &str = "CLUSTERING_ERROR";
pub const CODEMOD_ERROR: &str = "CODEMOD_ERROR";
pub const NO_DETERMINISTIC_FIX: &str = "NO_DETERMINISTIC_FIX";
pub const SANDBOX_ERROR: &str = "SANDBOX_ERROR";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const DB_BUSY: &str = "DB_BUSY";
pub const MIGRATION_FAILED: &str = "MIGRATION_FAILED";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const PUBLISH_ERROR: &str = "PUBLISH_ERROR";
pub const CANCELLED: &str = "CANCELLED";
pub const WORKER_ERROR: &str = "WORKER_ERROR";
