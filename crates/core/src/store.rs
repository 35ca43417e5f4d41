//! Session store — durable SQLite rows, the single source of truth.
//!
//! Uses `spawn_blocking` for async-safe SQLite access, one short-lived
//! connection per call with WAL and a busy timeout. Every successful
//! mutation publishes a `ChangeEvent` through the notifier, which is how
//! subscribed orchestrators learn to re-fetch.
//!
//! Write semantics are last-writer-wins with two deliberate guards:
//! `activate` and `fail` only apply while the row is still `scheduled`, so
//! the cancel-vs-join race resolves to exactly one winner at the store
//! layer; `end` applies to any non-ended row and is a no-op afterwards, so
//! near-simultaneous hangups from both sides never error. `started_at` and
//! `ended_at` go through `COALESCE` and are written at most once.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use casecall_protocol::{
    ChangeEvent, ChangeKind, CommunicationSession, FailureReason, Recording, RecordingPatch,
    RecordingStatus, SessionStatus, SessionType,
};

use crate::error::StoreError;
use crate::notifier::ChangeNotifier;

/// Persistent store contract. Optimistic, unconditional updates; no
/// cross-row transactions required of implementations.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &CommunicationSession) -> Result<(), StoreError>;

    async fn get(&self, session_id: &str) -> Result<Option<CommunicationSession>, StoreError>;

    /// Full session history for a case, oldest first.
    async fn list_by_case_id(
        &self,
        case_id: &str,
    ) -> Result<Vec<CommunicationSession>, StoreError>;

    /// `scheduled -> active`, setting `started_at` once. Returns `None`
    /// when the row is missing or no longer `scheduled` (the caller lost
    /// the race).
    async fn activate(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<CommunicationSession>, StoreError>;

    /// `scheduled -> failed` with a reason. Returns `None` when the row is
    /// missing or already left `scheduled`.
    async fn fail(
        &self,
        session_id: &str,
        reason: FailureReason,
        at: DateTime<Utc>,
    ) -> Result<Option<CommunicationSession>, StoreError>;

    /// Terminate: any non-ended row goes to `ended`, computing
    /// `duration_seconds` from `started_at` when the session connected.
    /// Returns `None` once the row is already `ended` (idempotent).
    async fn end(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<CommunicationSession>, StoreError>;

    /// Claim the at-most-one recording slot for a session. Returns `false`
    /// when another observer claimed it first.
    async fn claim_recording(&self, recording: &Recording) -> Result<bool, StoreError>;

    async fn get_recording(&self, session_id: &str) -> Result<Option<Recording>, StoreError>;

    /// Applied by the media collaborator when it finalizes an artifact.
    async fn update_recording(
        &self,
        session_id: &str,
        patch: RecordingPatch,
    ) -> Result<(), StoreError>;

    /// Record that `party_id` is still attached to the session. Written
    /// periodically by each party's watchdog; deliberately not broadcast
    /// as a change hint.
    async fn record_heartbeat(
        &self,
        session_id: &str,
        party_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// The party's most recent liveness timestamp, if it ever reported one.
    async fn get_heartbeat(
        &self,
        session_id: &str,
        party_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id               TEXT PRIMARY KEY,
    case_id          TEXT NOT NULL,
    session_type     TEXT NOT NULL,
    initiated_by     TEXT NOT NULL,
    client_id        TEXT NOT NULL,
    professional_id  TEXT NOT NULL,
    status           TEXT NOT NULL,
    failure_reason   TEXT,
    created_at       TEXT NOT NULL,
    started_at       TEXT,
    ended_at         TEXT,
    duration_seconds INTEGER
);
CREATE INDEX IF NOT EXISTS idx_sessions_case ON sessions(case_id, created_at);

CREATE TABLE IF NOT EXISTS recordings (
    session_id       TEXT PRIMARY KEY,
    id               TEXT NOT NULL,
    status           TEXT NOT NULL,
    media_url        TEXT,
    duration_seconds INTEGER,
    size_bytes       INTEGER,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS heartbeats (
    session_id TEXT NOT NULL,
    party_id   TEXT NOT NULL,
    last_seen  TEXT NOT NULL,
    PRIMARY KEY (session_id, party_id)
);
";

/// SQLite-backed store that publishes change hints after each mutation.
pub struct SqliteSessionStore {
    db_path: PathBuf,
    notifier: Arc<dyn ChangeNotifier>,
}

impl SqliteSessionStore {
    /// Open (and bootstrap) the database at `path`.
    pub async fn open(
        path: impl AsRef<Path>,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        let store = Self { db_path, notifier };
        store
            .with_conn(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(store)
    }

    /// Run `f` against a fresh connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<T, rusqlite::Error> {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Backend(anyhow::Error::new(e)))?;

        result.map_err(|e| StoreError::Backend(anyhow::Error::new(e)))
    }

    fn publish(&self, kind: ChangeKind, record: CommunicationSession) {
        debug!(
            component = "store",
            session_id = %record.id,
            case_id = %record.case_id,
            status = record.status.as_str(),
            "publishing change"
        );
        self.notifier.publish(ChangeEvent { kind, record });
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn insert(&self, session: &CommunicationSession) -> Result<(), StoreError> {
        let s = session.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, case_id, session_type, initiated_by, client_id,
                                       professional_id, status, failure_reason, created_at,
                                       started_at, ended_at, duration_seconds)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    s.id,
                    s.case_id,
                    s.session_type.as_str(),
                    s.initiated_by,
                    s.client_id,
                    s.professional_id,
                    s.status.as_str(),
                    s.failure_reason.map(|r| r.as_str()),
                    s.created_at.to_rfc3339(),
                    s.started_at.map(|t| t.to_rfc3339()),
                    s.ended_at.map(|t| t.to_rfc3339()),
                    s.duration_seconds,
                ],
            )?;
            Ok(())
        })
        .await?;

        self.publish(ChangeKind::Insert, session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<CommunicationSession>, StoreError> {
        let id = session_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, case_id, session_type, initiated_by, client_id, professional_id,
                        status, failure_reason, created_at, started_at, ended_at, duration_seconds
                 FROM sessions WHERE id = ?1",
                params![id],
                session_from_row,
            )
            .optional()
        })
        .await
    }

    async fn list_by_case_id(
        &self,
        case_id: &str,
    ) -> Result<Vec<CommunicationSession>, StoreError> {
        let case_id = case_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, case_id, session_type, initiated_by, client_id, professional_id,
                        status, failure_reason, created_at, started_at, ended_at, duration_seconds
                 FROM sessions WHERE case_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map(params![case_id], session_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn activate(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<CommunicationSession>, StoreError> {
        let id = session_id.to_string();
        let updated = self
            .with_conn(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let changed = tx.execute(
                    "UPDATE sessions
                     SET status = 'active',
                         started_at = COALESCE(started_at, ?1)
                     WHERE id = ?2 AND status = 'scheduled'",
                    params![at.to_rfc3339(), id],
                )?;
                let row = if changed == 1 {
                    tx.query_row(
                        "SELECT id, case_id, session_type, initiated_by, client_id,
                                professional_id, status, failure_reason, created_at, started_at,
                                ended_at, duration_seconds
                         FROM sessions WHERE id = ?1",
                        params![id],
                        session_from_row,
                    )
                    .optional()?
                } else {
                    None
                };
                tx.commit()?;
                Ok(row)
            })
            .await?;

        if let Some(record) = &updated {
            self.publish(ChangeKind::Update, record.clone());
        }
        Ok(updated)
    }

    async fn fail(
        &self,
        session_id: &str,
        reason: FailureReason,
        at: DateTime<Utc>,
    ) -> Result<Option<CommunicationSession>, StoreError> {
        let id = session_id.to_string();
        let updated = self
            .with_conn(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let changed = tx.execute(
                    "UPDATE sessions
                     SET status = 'failed',
                         failure_reason = ?1,
                         ended_at = COALESCE(ended_at, ?2)
                     WHERE id = ?3 AND status = 'scheduled'",
                    params![reason.as_str(), at.to_rfc3339(), id],
                )?;
                let row = if changed == 1 {
                    tx.query_row(
                        "SELECT id, case_id, session_type, initiated_by, client_id,
                                professional_id, status, failure_reason, created_at, started_at,
                                ended_at, duration_seconds
                         FROM sessions WHERE id = ?1",
                        params![id],
                        session_from_row,
                    )
                    .optional()?
                } else {
                    None
                };
                tx.commit()?;
                Ok(row)
            })
            .await?;

        if let Some(record) = &updated {
            self.publish(ChangeKind::Update, record.clone());
        }
        Ok(updated)
    }

    async fn end(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<CommunicationSession>, StoreError> {
        let id = session_id.to_string();
        let updated = self
            .with_conn(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let current = tx
                    .query_row(
                        "SELECT id, case_id, session_type, initiated_by, client_id,
                                professional_id, status, failure_reason, created_at, started_at,
                                ended_at, duration_seconds
                         FROM sessions WHERE id = ?1",
                        params![id],
                        session_from_row,
                    )
                    .optional()?;

                let row = match current {
                    None => None,
                    Some(s) if s.status == SessionStatus::Ended => None,
                    Some(s) => {
                        let duration = s.started_at.map(|started| {
                            (at - started).num_seconds().max(0)
                        });
                        tx.execute(
                            "UPDATE sessions
                             SET status = 'ended',
                                 ended_at = COALESCE(ended_at, ?1),
                                 duration_seconds = COALESCE(duration_seconds, ?2)
                             WHERE id = ?3",
                            params![at.to_rfc3339(), duration, id],
                        )?;
                        tx.query_row(
                            "SELECT id, case_id, session_type, initiated_by, client_id,
                                    professional_id, status, failure_reason, created_at,
                                    started_at, ended_at, duration_seconds
                             FROM sessions WHERE id = ?1",
                            params![id],
                            session_from_row,
                        )
                        .optional()?
                    }
                };
                tx.commit()?;
                Ok(row)
            })
            .await?;

        if let Some(record) = &updated {
            self.publish(ChangeKind::Update, record.clone());
        }
        Ok(updated)
    }

    async fn claim_recording(&self, recording: &Recording) -> Result<bool, StoreError> {
        let r = recording.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT INTO recordings (session_id, id, status, media_url, duration_seconds,
                                         size_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(session_id) DO NOTHING",
                params![
                    r.session_id,
                    r.id,
                    r.status.as_str(),
                    r.media_url,
                    r.duration_seconds,
                    r.size_bytes,
                    r.created_at.to_rfc3339(),
                ],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn get_recording(&self, session_id: &str) -> Result<Option<Recording>, StoreError> {
        let id = session_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT session_id, id, status, media_url, duration_seconds, size_bytes,
                        created_at
                 FROM recordings WHERE session_id = ?1",
                params![id],
                recording_from_row,
            )
            .optional()
        })
        .await
    }

    async fn update_recording(
        &self,
        session_id: &str,
        patch: RecordingPatch,
    ) -> Result<(), StoreError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let mut updates = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(id) = patch.id {
                updates.push("id = ?");
                params_vec.push(Box::new(id));
            }
            if let Some(status) = patch.status {
                updates.push("status = ?");
                params_vec.push(Box::new(status.as_str().to_string()));
            }
            if let Some(url) = patch.media_url {
                updates.push("media_url = ?");
                params_vec.push(Box::new(url));
            }
            if let Some(d) = patch.duration_seconds {
                updates.push("duration_seconds = ?");
                params_vec.push(Box::new(d));
            }
            if let Some(b) = patch.size_bytes {
                updates.push("size_bytes = ?");
                params_vec.push(Box::new(b));
            }

            if !updates.is_empty() {
                let sql = format!(
                    "UPDATE recordings SET {} WHERE session_id = ?",
                    updates.join(", ")
                );
                params_vec.push(Box::new(session_id));
                let params_refs: Vec<&dyn rusqlite::ToSql> =
                    params_vec.iter().map(|b| b.as_ref()).collect();
                conn.execute(&sql, rusqlite::params_from_iter(params_refs))?;
            }
            Ok(())
        })
        .await
    }

    async fn record_heartbeat(
        &self,
        session_id: &str,
        party_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let session_id = session_id.to_string();
        let party_id = party_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO heartbeats (session_id, party_id, last_seen)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id, party_id) DO UPDATE SET last_seen = excluded.last_seen",
                params![session_id, party_id, at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_heartbeat(
        &self,
        session_id: &str,
        party_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let session_id = session_id.to_string();
        let party_id = party_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT last_seen FROM heartbeats WHERE session_id = ?1 AND party_id = ?2",
                params![session_id, party_id],
                |row| {
                    let ts: String = row.get(0)?;
                    parse_ts(0, &ts)
                },
            )
            .optional()
        })
        .await
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<CommunicationSession> {
    let session_type: String = row.get(2)?;
    let status: String = row.get(6)?;
    let failure_reason: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    let started_at: Option<String> = row.get(9)?;
    let ended_at: Option<String> = row.get(10)?;

    Ok(CommunicationSession {
        id: row.get(0)?,
        case_id: row.get(1)?,
        session_type: SessionType::parse(&session_type)
            .ok_or_else(|| text_error(2, format!("unknown session_type {session_type:?}")))?,
        initiated_by: row.get(3)?,
        client_id: row.get(4)?,
        professional_id: row.get(5)?,
        status: SessionStatus::parse(&status)
            .ok_or_else(|| text_error(6, format!("unknown status {status:?}")))?,
        failure_reason: match failure_reason {
            Some(r) => Some(
                FailureReason::parse(&r)
                    .ok_or_else(|| text_error(7, format!("unknown failure_reason {r:?}")))?,
            ),
            None => None,
        },
        created_at: parse_ts(8, &created_at)?,
        started_at: started_at.as_deref().map(|t| parse_ts(9, t)).transpose()?,
        ended_at: ended_at.as_deref().map(|t| parse_ts(10, t)).transpose()?,
        duration_seconds: row.get(11)?,
    })
}

fn recording_from_row(row: &Row<'_>) -> rusqlite::Result<Recording> {
    let status: String = row.get(2)?;
    let created_at: String = row.get(6)?;

    Ok(Recording {
        session_id: row.get(0)?,
        id: row.get(1)?,
        status: RecordingStatus::parse(&status)
            .ok_or_else(|| text_error(2, format!("unknown recording status {status:?}")))?,
        media_url: row.get(3)?,
        duration_seconds: row.get(4)?,
        size_bytes: row.get(5)?,
        created_at: parse_ts(6, &created_at)?,
    })
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn text_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::<dyn std::error::Error + Send + Sync>::from(message),
    )
}
