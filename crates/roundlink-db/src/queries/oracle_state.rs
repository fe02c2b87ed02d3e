//! Reconciliation state query functions.

use roundlink_types::OracleObservationState;
use rusqlite::{Connection, OptionalExtension};

use crate::{DbError, Result};

/// Load an oracle's persisted observation state, if any.
pub fn load(conn: &Connection, oracle: &str) -> Result<Option<OracleObservationState>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT state_json FROM oracle_state WHERE oracle = ?1",
            [oracle],
            |row| row.get(0),
        )
        .optional()?;

    json.map(|json| {
        serde_json::from_str::<OracleObservationState>(&json)
            .map_err(|e| DbError::Serialization(e.to_string()))
    })
    .transpose()
}

/// Save an oracle's observation state, replacing any previous one.
pub fn save(
    conn: &Connection,
    oracle: &str,
    state: &OracleObservationState,
    updated_at: u64,
) -> Result<()> {
    let json = serde_json::to_string(state).map_err(|e| DbError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT OR REPLACE INTO oracle_state (oracle, last_submission_id, state_json, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            oracle,
            state.last_submission_id as i64,
            json,
            updated_at as i64,
        ],
    )?;
    Ok(())
}
