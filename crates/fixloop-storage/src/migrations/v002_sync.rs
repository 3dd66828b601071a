//! V002: incremental sync watermarks and review publication ledger.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sync_watermarks (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
) STRICT;

-- Keyed by (pr, sorted finding set) digest.
CREATE TABLE IF NOT EXISTS publications (
    publication_key TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    recorded_at INTEGER NOT NULL
) STRICT;
"#;
