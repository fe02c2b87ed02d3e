//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Submission jobs, one row per feed
-- ============================================================

CREATE TABLE IF NOT EXISTS jobs (
    name TEXT PRIMARY KEY,
    last_submission_time INTEGER NOT NULL DEFAULT 0,
    last_reported_round INTEGER NOT NULL DEFAULT 0,
    last_result TEXT,
    lock_holder TEXT,
    lock_expires_at INTEGER NOT NULL DEFAULT 0
);

-- ============================================================
-- Reconciliation state, one row per oracle
-- ============================================================

CREATE TABLE IF NOT EXISTS oracle_state (
    oracle TEXT PRIMARY KEY,
    last_submission_id INTEGER NOT NULL DEFAULT 0,
    state_json TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;
