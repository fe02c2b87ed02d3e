//! Submission job query functions.
//!
//! One row per feed. Besides bookkeeping of attempts and reported results,
//! the row carries a time-bounded lease: while a holder's lease is unexpired,
//! other processes treat a submission for the feed as in progress.

use rusqlite::{Connection, OptionalExtension};

use crate::{DbError, Result};

/// A job row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobRow {
    pub name: String,
    pub last_submission_time: u64,
    pub last_reported_round: u64,
    pub last_result: Option<String>,
    pub lock_holder: Option<String>,
    pub lock_expires_at: u64,
}

/// Record the time of a submission attempt, creating the job if needed.
pub fn record_submission_attempt(conn: &Connection, name: &str, timestamp: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO jobs (name, last_submission_time) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET last_submission_time = excluded.last_submission_time",
        rusqlite::params![name, timestamp as i64],
    )?;
    Ok(())
}

/// Record the final result reported for a round.
pub fn record_result(conn: &Connection, name: &str, round: u64, result: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO jobs (name, last_reported_round, last_result) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET
             last_reported_round = excluded.last_reported_round,
             last_result = excluded.last_result",
        rusqlite::params![name, round as i64, result],
    )?;
    Ok(())
}

/// Get a job by name.
pub fn get(conn: &Connection, name: &str) -> Result<JobRow> {
    conn.query_row(
        "SELECT name, last_submission_time, last_reported_round, last_result,
                lock_holder, lock_expires_at
         FROM jobs WHERE name = ?1",
        [name],
        |row| {
            Ok(JobRow {
                name: row.get(0)?,
                last_submission_time: row.get::<_, i64>(1)? as u64,
                last_reported_round: row.get::<_, i64>(2)? as u64,
                last_result: row.get(3)?,
                lock_holder: row.get(4)?,
                lock_expires_at: row.get::<_, i64>(5)? as u64,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("job '{name}'")),
        other => DbError::Sqlite(other),
    })
}

/// Try to take the job's lease for `holder` until `now + ttl_secs`.
///
/// Succeeds when the lease is free, expired, or already held by `holder`
/// (which extends it). Returns whether `holder` now holds the lease.
pub fn try_acquire_lock(
    conn: &Connection,
    name: &str,
    holder: &str,
    now: u64,
    ttl_secs: u64,
) -> Result<bool> {
    let expires_at = i64::try_from(now.saturating_add(ttl_secs)).unwrap_or(i64::MAX);
    let updated = conn.execute(
        "INSERT INTO jobs (name, lock_holder, lock_expires_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET
             lock_holder = excluded.lock_holder,
             lock_expires_at = excluded.lock_expires_at
         WHERE jobs.lock_holder IS NULL
            OR jobs.lock_holder = excluded.lock_holder
            OR jobs.lock_expires_at <= ?4",
        rusqlite::params![name, holder, expires_at, now as i64],
    )?;
    Ok(updated > 0)
}

/// Release the lease if `holder` owns it. Returns whether anything was released.
pub fn release_lock(conn: &Connection, name: &str, holder: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE jobs SET lock_holder = NULL, lock_expires_at = 0
         WHERE name = ?1 AND lock_holder = ?2",
        rusqlite::params![name, holder],
    )?;
    Ok(updated > 0)
}

/// Holder of the job's unexpired lease, if any.
pub fn active_holder(conn: &Connection, name: &str, now: u64) -> Result<Option<String>> {
    let holder: Option<Option<String>> = conn
        .query_row(
            "SELECT lock_holder FROM jobs WHERE name = ?1 AND lock_expires_at > ?2",
            rusqlite::params![name, now as i64],
            |row| row.get(0),
        )
        .optional()?;
    Ok(holder.flatten())
}
