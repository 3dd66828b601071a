//! Metric names recorded under the `fixloop::metrics` tracing target.

/// Pairing: pairs created in a batch.
pub const PAIRS_CREATED: &str = "pairs_created";

/// Pairing: pairs promoted in a batch.
pub const PAIRS_PROMOTED: &str = "pairs_promoted";

/// Aggregation: clusters produced by a run.
pub const CLUSTER_COUNT: &str = "cluster_count";

/// Aggregation: near-threshold warnings emitted by a run.
pub const NEAR_THRESHOLD_WARNINGS: &str = "near_threshold_warnings";

/// Aggregation: similarity cache hit rate (0.0 - 1.0).
pub const CACHE_HIT_RATE: &str = "cache_hit_rate";

/// Lifecycle: transitions applied in a run.
pub const TRANSITIONS_APPLIED: &str = "transitions_applied";

/// Replay: wall time of one replay run in milliseconds.
pub const REPLAY_TIME: &str = "replay_time_ms";

/// Storage: write time of one persistence step in milliseconds.
pub const PERSIST_TIME: &str = "persist_time_ms";

/// Whole promotion run duration in milliseconds.
pub const RUN_DURATION: &str = "run_duration_ms";
