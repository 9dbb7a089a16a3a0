use super::traits::{SessionSummary, Storage, StorageError};
use crate::event::{EventRow, InteractionEvent, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Check if a process with the given PID is still running
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use std::process::Command;
        Command::new("ps")
            .arg("-p")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        // On non-Unix systems, assume process is running to be safe
        true
    }
}

/// Extract the PID from a DuckDB lock error message ("... (PID 12345) ...")
fn extract_pid_from_lock_error(error_msg: &str) -> Option<u32> {
    let start = error_msg.find("(PID ")? + 5;
    let end = error_msg[start..].find(')')?;
    error_msg[start..start + end].parse().ok()
}

fn remove_lock_files(db_path: &Path) -> std::io::Result<()> {
    for suffix in ["wal", "lock"] {
        let path = PathBuf::from(format!("{}.{}", db_path.display(), suffix));
        if path.exists() {
            std::fs::remove_file(&path)?;
            tracing::info!("Removed stale {} file: {}", suffix, path.display());
        }
    }
    Ok(())
}

fn timestamp_from_micros(col: usize, micros: i64) -> Result<DateTime<Utc>, duckdb::Error> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        duckdb::Error::FromSqlConversionFailure(
            col,
            duckdb::types::Type::BigInt,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "invalid timestamp",
            )),
        )
    })
}

/// DuckDB implementation of the Storage trait
pub struct DuckDbStorage {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStorage {
    /// Open (or create) a database file. If the file is locked by a process
    /// that is no longer running, stale lock files are removed and the open
    /// is retried once.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        match Connection::open(path) {
            Ok(conn) => Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
            }),
            Err(e) => {
                let error_msg = e.to_string();

                if error_msg.contains("Could not set lock") {
                    tracing::warn!("Database lock detected: {}", error_msg);

                    if let Some(pid) = extract_pid_from_lock_error(&error_msg) {
                        if !is_process_running(pid) {
                            tracing::warn!(
                                "Process {} is not running, removing stale lock files",
                                pid
                            );
                            if let Err(io_err) = remove_lock_files(path) {
                                tracing::error!("Failed to remove lock files: {}", io_err);
                                return Err(e.into());
                            }

                            let conn = Connection::open(path)?;
                            return Ok(Self {
                                conn: Arc::new(Mutex::new(conn)),
                            });
                        }
                        tracing::error!("Process {} is still running, cannot acquire lock", pid);
                    }
                }

                Err(e.into())
            }
        }
    }

    /// Create an in-memory DuckDB storage instance (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn row_to_session(row: &duckdb::Row<'_>) -> Result<Session, duckdb::Error> {
    Ok(Session {
        id: row.get(0)?,
        website_id: row.get(1)?,
        started_at: timestamp_from_micros(2, row.get::<_, i64>(2)?)?,
    })
}

#[async_trait]
impl Storage for DuckDbStorage {
    async fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            conn.execute(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id VARCHAR PRIMARY KEY,
                    website_id VARCHAR NOT NULL,
                    started_at TIMESTAMPTZ NOT NULL
                )",
                [],
            )?;

            // arrival_seq preserves insertion order; it breaks timestamp
            // ties so replay order is stable across loads.
            conn.execute("CREATE SEQUENCE IF NOT EXISTS event_arrival_seq", [])?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS events (
                    event_id UUID PRIMARY KEY,
                    session_id VARCHAR NOT NULL,
                    arrival_seq BIGINT NOT NULL DEFAULT nextval('event_arrival_seq'),
                    event_type VARCHAR NOT NULL,
                    event_timestamp_ms BIGINT NOT NULL,
                    payload JSON NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id)",
                [],
            )?;

            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn upsert_session(&self, id: &str, website_id: &str) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let id = id.to_string();
        let website_id = website_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO sessions (id, website_id, started_at)
                 VALUES (?, ?, to_timestamp(? / 1000000.0))
                 ON CONFLICT (id) DO NOTHING",
                duckdb::params![id, website_id, Utc::now().timestamp_micros()],
            )?;
            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StorageError> {
        let conn = self.conn.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, website_id, epoch_us(started_at) FROM sessions WHERE id = ?",
            )?;

            let mut rows = stmt.query(duckdb::params![id])?;
            if let Some(row) = rows.next()? {
                Ok(Some(row_to_session(row)?))
            } else {
                Ok(None)
            }
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn append_events(
        &self,
        session_id: &str,
        events: &[InteractionEvent],
    ) -> Result<(), StorageError> {
        if events.is_empty() {
            return Ok(());
        }

        let conn = self.conn.clone();
        let session_id = session_id.to_string();

        // Serialize payloads up front so a malformed event fails before the
        // transaction opens.
        let rows: Vec<(String, &'static str, i64, String)> = events
            .iter()
            .map(|event| {
                Ok((
                    Uuid::new_v4().to_string(),
                    event.kind(),
                    event.timestamp(),
                    event.data_json()?,
                ))
            })
            .collect::<Result<_, serde_json::Error>>()?;

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();

            // One transaction per batch: a failed append leaves no partial rows.
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO events (event_id, session_id, event_type, event_timestamp_ms, payload)
                     VALUES (?, ?, ?, ?, ?)",
                )?;

                for (event_id, event_type, timestamp_ms, payload) in rows {
                    stmt.execute(duckdb::params![
                        event_id,
                        session_id,
                        event_type,
                        timestamp_ms,
                        payload,
                    ])?;
                }
            }
            tx.commit()?;

            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn session_event_rows(&self, session_id: &str) -> Result<Vec<EventRow>, StorageError> {
        let conn = self.conn.clone();
        let session_id = session_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT event_id, arrival_seq, event_type, event_timestamp_ms, payload
                 FROM events
                 WHERE session_id = ?
                 ORDER BY arrival_seq",
            )?;

            let rows = stmt.query_map(duckdb::params![session_id], |row| {
                let event_id = Uuid::parse_str(&row.get::<_, String>(0)?).map_err(|e| {
                    duckdb::Error::FromSqlConversionFailure(
                        0,
                        duckdb::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                let arrival_seq: i64 = row.get(1)?;
                let event_type: String = row.get(2)?;
                let timestamp_ms: i64 = row.get(3)?;
                let payload: String = row.get(4)?;
                Ok((event_id, arrival_seq, event_type, timestamp_ms, payload))
            })?;

            let mut events = Vec::new();
            for row in rows {
                let (event_id, arrival_seq, event_type, timestamp_ms, payload) = row?;
                let event = InteractionEvent::from_parts(&event_type, timestamp_ms, &payload)?;
                events.push(EventRow {
                    event_id,
                    arrival_seq,
                    event,
                });
            }
            Ok(events)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn list_sessions(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SessionSummary>, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT s.id, s.website_id, epoch_us(s.started_at), count(e.event_id)
                 FROM sessions s
                 LEFT JOIN events e ON e.session_id = s.id
                 GROUP BY s.id, s.website_id, s.started_at
                 ORDER BY s.started_at DESC, s.id
                 LIMIT ? OFFSET ?",
            )?;

            let rows = stmt.query_map(duckdb::params![limit as i64, offset as i64], |row| {
                Ok(SessionSummary {
                    session: row_to_session(row)?,
                    event_count: row.get::<_, i64>(3)? as usize,
                })
            })?;

            let mut summaries = Vec::new();
            for row in rows {
                summaries.push(row?);
            }
            Ok(summaries)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn count_sessions(&self) -> Result<usize, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare("SELECT count(*) FROM sessions")?;
            let count: i64 = stmt.query_row([], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}
