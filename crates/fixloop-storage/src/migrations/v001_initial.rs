//! V001: pairs, patterns, decisions, store attempts, codemods.

pub const MIGRATION_SQL: &str = r#"
-- Durable copies of scored pairs. created_at is the resolution instant.
CREATE TABLE IF NOT EXISTS pairs (
    pair_id TEXT PRIMARY KEY,
    finding_id TEXT NOT NULL,
    fix_commit_sha TEXT NOT NULL,
    repo TEXT NOT NULL,
    rule_id TEXT NOT NULL,
    file_path TEXT NOT NULL,
    pairing_type TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    disappearance_confirmed INTEGER NOT NULL,
    promoted INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    payload TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_pairs_promoted_created
    ON pairs(created_at, pair_id) WHERE promoted = 1;

-- Learned pattern versions. Rows are never deleted.
CREATE TABLE IF NOT EXISTS patterns (
    pattern_id TEXT PRIMARY KEY,
    signature TEXT NOT NULL,
    domain TEXT NOT NULL,
    version INTEGER NOT NULL,
    pattern_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    label_agreement REAL NOT NULL,
    cluster_cohesion REAL NOT NULL,
    frequency_factor REAL NOT NULL,
    state TEXT NOT NULL
        CHECK (state IN ('candidate', 'provisional', 'validated', 'deprecated')),
    is_current INTEGER NOT NULL,
    member_count INTEGER NOT NULL,
    sustained_runs INTEGER NOT NULL DEFAULT 0,
    member_ids TEXT NOT NULL,
    stored_at INTEGER NOT NULL,
    source_run_id TEXT,
    correlation_id TEXT,
    UNIQUE (signature, domain, version)
) STRICT;

-- At most one current row per lineage.
CREATE UNIQUE INDEX IF NOT EXISTS idx_patterns_current
    ON patterns(signature, domain) WHERE is_current = 1;
CREATE INDEX IF NOT EXISTS idx_patterns_state
    ON patterns(state, domain) WHERE is_current = 1;
CREATE INDEX IF NOT EXISTS idx_patterns_type
    ON patterns(pattern_type, domain) WHERE is_current = 1;

-- First-write-wins decision audit.
CREATE TABLE IF NOT EXISTS decisions (
    decision_id TEXT PRIMARY KEY,
    decision_type TEXT NOT NULL,
    selected_candidate TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    payload TEXT NOT NULL,
    stored_at INTEGER NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_decisions_type
    ON decisions(decision_type, timestamp, decision_id);
CREATE INDEX IF NOT EXISTS idx_decisions_selected
    ON decisions(selected_candidate, timestamp, decision_id);
CREATE INDEX IF NOT EXISTS idx_decisions_order
    ON decisions(timestamp, decision_id);

-- Every decision store call, including duplicates.
CREATE TABLE IF NOT EXISTS store_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    decision_id TEXT NOT NULL,
    correlation_id TEXT,
    outcome TEXT NOT NULL CHECK (outcome IN ('inserted', 'duplicate')),
    attempted_at INTEGER NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_store_attempts_decision
    ON store_attempts(decision_id);

CREATE TABLE IF NOT EXISTS codemods (
    codemod_id TEXT PRIMARY KEY,
    pattern_id TEXT NOT NULL,
    rule_id TEXT NOT NULL,
    language TEXT NOT NULL,
    codemod_source TEXT NOT NULL,
    transform_signature TEXT NOT NULL,
    status TEXT NOT NULL
        CHECK (status IN ('pending', 'validated', 'failed', 'rejected')),
    replay_passed INTEGER NOT NULL,
    replay_result TEXT,
    stored_at INTEGER NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_codemods_exposable
    ON codemods(rule_id, codemod_id) WHERE status = 'validated' AND replay_passed = 1;
"#;
