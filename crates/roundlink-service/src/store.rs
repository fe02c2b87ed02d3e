//! SQLite-backed job store and in-progress flag.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use roundlink_db::queries::{jobs, oracle_state};
use roundlink_db::DbError;
use roundlink_oracle::ports::{JobStore, SubmissionFlag};
use roundlink_oracle::{OracleError, Result};
use roundlink_types::{OracleObservationState, RoundId};
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::debug;

use crate::unix_now;

fn store_err(e: DbError) -> OracleError {
    OracleError::Store(e.to_string())
}

/// Shared database handle plus the lease holder name of this process.
///
/// The database lease keeps other processes off a feed. Jobs inside this
/// process share `holder`, so they are kept apart by the `claimed` set.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    holder: String,
    /// Feeds with a job running under `holder`. Locked before `conn`.
    claimed: Arc<Mutex<HashSet<String>>>,
}

impl SqliteStore {
    pub fn new(conn: Connection, holder: impl Into<String>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            holder: holder.into(),
            claimed: Arc::default(),
        }
    }

    /// Open the database file, holding leases as `roundlink-<pid>`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = roundlink_db::open(path).map_err(store_err)?;
        Ok(Self::new(conn, format!("roundlink-{}", std::process::id())))
    }

    /// Another handle on the same database leasing under `holder`.
    pub fn with_holder(&self, holder: impl Into<String>) -> Self {
        Self {
            conn: self.conn.clone(),
            holder: holder.into(),
            claimed: Arc::default(),
        }
    }

    /// Take the feed's submission lease for `ttl_secs`.
    ///
    /// Fails while another holder's lease is live or while a job of this
    /// handle's holder already has the feed.
    pub async fn acquire_lease(&self, feed: &str, ttl_secs: u64) -> Result<bool> {
        let mut claimed = self.claimed.lock().await;
        if claimed.contains(feed) {
            debug!(feed, holder = %self.holder, "feed already claimed in this process");
            return Ok(false);
        }
        let conn = self.conn.lock().await;
        let acquired = jobs::try_acquire_lock(&conn, feed, &self.holder, unix_now(), ttl_secs)
            .map_err(store_err)?;
        if acquired {
            claimed.insert(feed.to_string());
        }
        Ok(acquired)
    }

    /// Give up the feed's lease. The in-process claim is dropped even when
    /// the database update fails.
    pub async fn release_lease(&self, feed: &str) -> Result<()> {
        let mut claimed = self.claimed.lock().await;
        claimed.remove(feed);
        let conn = self.conn.lock().await;
        let released = jobs::release_lock(&conn, feed, &self.holder).map_err(store_err)?;
        if !released {
            debug!(feed, holder = %self.holder, "no lease to release");
        }
        Ok(())
    }

    /// Remember the outcome reported for `round`.
    pub async fn record_result(&self, feed: &str, round: RoundId, result: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        jobs::record_result(&conn, feed, round, result).map_err(store_err)
    }

    pub async fn job(&self, feed: &str) -> Result<Option<jobs::JobRow>> {
        let conn = self.conn.lock().await;
        match jobs::get(&conn, feed) {
            Ok(job) => Ok(Some(job)),
            Err(DbError::NotFound(_)) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    /// Persisted observation state of `oracle`, empty if never saved.
    pub async fn load_state(&self, oracle: &str) -> Result<OracleObservationState> {
        let conn = self.conn.lock().await;
        Ok(oracle_state::load(&conn, oracle)
            .map_err(store_err)?
            .unwrap_or_default())
    }

    pub async fn save_state(&self, oracle: &str, state: &OracleObservationState) -> Result<()> {
        let conn = self.conn.lock().await;
        oracle_state::save(&conn, oracle, state, unix_now()).map_err(store_err)
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn record_submission_attempt(&self, feed: &str, timestamp: u64) -> Result<()> {
        let conn = self.conn.lock().await;
        jobs::record_submission_attempt(&conn, feed, timestamp).map_err(store_err)
    }
}

#[async_trait]
impl SubmissionFlag for SqliteStore {
    /// True while another holder has an unexpired lease on the feed.
    async fn is_in_progress(&self, feed: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let holder = jobs::active_holder(&conn, feed, unix_now()).map_err(store_err)?;
        Ok(holder.is_some_and(|holder| holder != self.holder))
    }
}
