//! Session persistence
//!
//! A session is a row in `sessions` plus its ordered rows in `messages`.
//! `save_session` writes both in one transaction so a turn is either fully
//! stored or not at all.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    // ==================== Session Operations ====================

    /// Load a session. Unknown ids yield a fresh, unsaved session.
    pub fn load_session(&self, session_id: &str) -> DbResult<Session> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                "SELECT pending_suspension, created_at, updated_at FROM sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((pending_json, created_at, updated_at)) = row else {
            return Ok(Session::new(session_id));
        };

        let pending_suspension = pending_json
            .map(|json| serde_json::from_str::<Suspension>(&json))
            .transpose()?;

        let mut stmt = conn.prepare(
            "SELECT message_id, sequence_id, message_type, content, created_at
             FROM messages WHERE session_id = ?1 ORDER BY sequence_id ASC",
        )?;
        let raw_rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let messages = raw_rows
            .into_iter()
            .map(|(message_id, sequence_id, msg_type, content, created_at)| {
                let message_type: MessageType = msg_type.parse().map_err(DbError::Corrupt)?;
                let value = serde_json::from_str(&content)?;
                let content =
                    MessageContent::from_json(message_type, value).map_err(DbError::Corrupt)?;
                Ok(Message {
                    message_id,
                    sequence_id,
                    message_type,
                    content,
                    created_at: parse_datetime(&created_at),
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Session {
            session_id: session_id.to_string(),
            messages,
            pending_suspension,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    /// Durably upsert a session.
    ///
    /// Messages already stored (by sequence id) are left alone; only newer
    /// ones are inserted. Runs in a single transaction.
    pub fn save_session(&self, session: &Session) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let pending = session
            .pending_suspension
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        tx.execute(
            "INSERT INTO sessions (id, pending_suspension, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                pending_suspension = excluded.pending_suspension,
                updated_at = excluded.updated_at",
            params![
                session.session_id,
                pending,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )?;

        let stored_max: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) FROM messages WHERE session_id = ?1",
            params![session.session_id],
            |row| row.get(0),
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO messages (message_id, session_id, sequence_id, message_type, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for msg in session.messages.iter().filter(|m| m.sequence_id > stored_max) {
                insert.execute(params![
                    msg.message_id,
                    session.session_id,
                    msg.sequence_id,
                    msg.message_type.to_string(),
                    serde_json::to_string(&msg.content.to_json())?,
                    msg.created_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Ids of stored sessions, most recently updated first
    pub fn list_session_ids(&self) -> DbResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM sessions ORDER BY updated_at DESC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
