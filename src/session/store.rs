use super::SessionSnapshot;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A snapshot written by another execution context
#[derive(Clone, Debug)]
pub struct SessionUpdate {
    pub snapshot: SessionSnapshot,
    pub revision: i64,
    /// Context id of the writer
    pub writer: String,
}

/// Durable single-key session storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE session_state (
///     key TEXT PRIMARY KEY,
///     value TEXT NOT NULL,        -- JSON SessionSnapshot
///     revision INTEGER NOT NULL,  -- bumped on every write
///     writer TEXT NOT NULL,       -- context id of the last writer
///     updated_at TEXT NOT NULL    -- RFC 3339
/// );
/// ```
///
/// Every open store is its own execution context (like a browser tab). It
/// reports writes made by *other* contexts through [`subscribe`](Self::subscribe)
/// once [`run_watcher`](Self::run_watcher) is running; its own writes are not
/// echoed back.
pub struct SessionStore {
    conn: Mutex<Connection>,
    key: String,
    context_id: String,
    last_seen_revision: AtomicI64,
    updates_tx: broadcast::Sender<SessionUpdate>,
}

impl SessionStore {
    /// Open (or create) the store and remember the current revision so the
    /// existing value is treated as initial state, not as a change.
    pub fn open<P: AsRef<Path>>(db_path: P, key: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open session database")?;
        conn.busy_timeout(Duration::from_secs(2))
            .context("Failed to set busy timeout")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS session_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                revision INTEGER NOT NULL,
                writer TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create session_state table")?;

        let revision: i64 = conn
            .query_row(
                "SELECT revision FROM session_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read session revision")?
            .unwrap_or(0);

        let (updates_tx, _) = broadcast::channel(64);

        Ok(Self {
            conn: Mutex::new(conn),
            key: key.to_string(),
            context_id: Uuid::new_v4().to_string(),
            last_seen_revision: AtomicI64::new(revision),
            updates_tx,
        })
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace the stored snapshot wholesale. Returns the new revision.
    pub fn persist(&self, snapshot: &SessionSnapshot) -> Result<i64> {
        let value = serde_json::to_string(snapshot).context("Failed to serialize session snapshot")?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().unwrap();
        let revision: i64 = conn
            .query_row(
                r#"
                INSERT INTO session_state (key, value, revision, writer, updated_at)
                VALUES (?1, ?2, 1, ?3, ?4)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    revision = session_state.revision + 1,
                    writer = excluded.writer,
                    updated_at = excluded.updated_at
                RETURNING revision
                "#,
                params![self.key, value, self.context_id, now],
                |row| row.get(0),
            )
            .context("Failed to persist session snapshot")?;

        debug!(key = %self.key, revision = revision, "Session snapshot persisted");
        Ok(revision)
    }

    /// Current stored snapshot, or `None` if nothing was ever written
    pub fn load(&self) -> Result<Option<SessionSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM session_state WHERE key = ?1",
                params![self.key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read session snapshot")?;

        match value {
            Some(json) => {
                let snapshot =
                    serde_json::from_str(&json).context("Failed to deserialize session snapshot")?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Subscribe to snapshots written by other contexts
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates_tx.subscribe()
    }

    /// Check the stored revision once.
    ///
    /// Returns the snapshot if another context wrote since the last check.
    /// Own writes advance the seen revision silently.
    pub fn check_for_changes(&self) -> Result<Option<SessionUpdate>> {
        let row: Option<(String, i64, String)> = {
            let conn = self.conn.lock().unwrap();
            let row = conn
                .query_row(
                    "SELECT value, revision, writer FROM session_state WHERE key = ?1",
                    params![self.key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .context("Failed to poll session revision")?;
            row
        };

        let Some((value, revision, writer)) = row else {
            return Ok(None);
        };

        if revision <= self.last_seen_revision.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.last_seen_revision.store(revision, Ordering::SeqCst);

        if writer == self.context_id {
            return Ok(None);
        }

        let snapshot: SessionSnapshot =
            serde_json::from_str(&value).context("Failed to deserialize session snapshot")?;

        Ok(Some(SessionUpdate {
            snapshot,
            revision,
            writer,
        }))
    }

    /// Poll for other writers and broadcast what they wrote.
    ///
    /// Runs until the task is aborted.
    pub async fn run_watcher(self: Arc<Self>, poll_every: Duration) {
        info!(
            key = %self.key,
            context_id = %self.context_id,
            interval_ms = poll_every.as_millis() as u64,
            "Starting session watcher"
        );

        let mut ticker = interval(poll_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            match self.check_for_changes() {
                Ok(Some(update)) => {
                    debug!(
                        revision = update.revision,
                        writer = %update.writer,
                        "Session changed in another context"
                    );
                    // No subscribers is fine
                    let _ = self.updates_tx.send(update);
                }
                Ok(None) => {}
                Err(e) => {
                    // A half-written or foreign value is skipped, the next write is picked up
                    if e.chain().any(|c| c.is::<serde_json::Error>()) {
                        warn!(error = %e, "Ignoring unreadable session snapshot");
                    } else {
                        error!(error = %e, "Session watcher poll failed");
                    }
                }
            }
        }
    }
}
