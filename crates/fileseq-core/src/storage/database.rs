//! SQLite-based storage for users, sequences and their ordered items.
//!
//! Every read-then-write operation runs inside one `BEGIN IMMEDIATE`
//! transaction on a connection guarded by a mutex, so position assignment
//! and the single-open-sequence check are atomic both within a process and
//! across processes sharing the same database file.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use super::config::Config;
use super::migrations;
use crate::error::{CoreError, DatabaseError};
use crate::sequence::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceStatus {
    Open,
    Completed,
}

impl SequenceStatus {
    fn as_str(self) -> &'static str {
        match self {
            SequenceStatus::Open => "open",
            SequenceStatus::Completed => "completed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(SequenceStatus::Open),
            "completed" => Some(SequenceStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: i64,
    pub user_id: i64,
    pub status: SequenceStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// One stored media submission. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub sequence_id: i64,
    pub kind: MediaKind,
    pub payload_ref: String,
    pub caption: Option<String>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// SQLite database holding all sequencing state.
///
/// Handlers receive a shared reference; the connection is never exposed.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// `busy_timeout` bounds how long a writer waits for another process's
    /// transaction before failing with [`DatabaseError::Locked`].
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(busy_timeout)?;
        let db = Self::init(conn, Some(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open the database `config` points at (`FILESEQ_DB`, then
    /// `storage.db_path`, then the data directory).
    pub fn open_with_config(config: &Config) -> Result<Self, CoreError> {
        let path = config.db_path()?;
        let timeout = Duration::from_millis(config.storage.busy_timeout_ms);
        Ok(Self::open(&path, timeout)?)
    }

    /// Open the database named by the config file in the data directory.
    ///
    /// # Errors
    /// Returns an error if the config cannot be loaded or the database
    /// cannot be opened.
    pub fn open_default() -> Result<Self, CoreError> {
        Self::open_with_config(&Config::load()?)
    }

    /// Open an in-memory database (tests and dry runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// File backing this database, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the connection, surfacing any error from SQLite.
    pub fn close(self) -> Result<(), DatabaseError> {
        let conn = self.conn.into_inner().map_err(|_| DatabaseError::Poisoned)?;
        conn.close().map_err(|(_, e)| DatabaseError::from(e))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction.
    ///
    /// Any error rolls the whole unit back when the transaction is dropped.
    fn atomic<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // === Users ===

    /// Map an external identity to an internal user id, creating it on first use.
    pub fn resolve_or_create_user(&self, external_id: &str) -> Result<i64, DatabaseError> {
        self.atomic(|tx| {
            let inserted = tx.execute(
                "INSERT INTO users (external_id, created_at) VALUES (?1, ?2)
                 ON CONFLICT(external_id) DO NOTHING",
                params![external_id, Utc::now().to_rfc3339()],
            )?;
            let id: i64 = tx.query_row(
                "SELECT id FROM users WHERE external_id = ?1",
                params![external_id],
                |row| row.get(0),
            )?;
            if inserted > 0 {
                tracing::debug!(external_id, user_id = id, "user created");
            }
            Ok(id)
        })
    }

    /// Look up a user without creating one.
    pub fn find_user(&self, external_id: &str) -> Result<Option<i64>, DatabaseError> {
        let conn = self.lock()?;
        let id = conn
            .query_row(
                "SELECT id FROM users WHERE external_id = ?1",
                params![external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    // === Sequences ===

    /// Open a new sequence for `user_id`.
    ///
    /// # Errors
    /// [`DatabaseError::Conflict`] if the user already has an open sequence.
    pub fn open_sequence(&self, user_id: i64) -> Result<i64, DatabaseError> {
        self.atomic(|tx| {
            if find_open(tx, user_id)?.is_some() {
                return Err(DatabaseError::Conflict { user_id });
            }
            tx.execute(
                "INSERT INTO sequences (user_id, status, created_at) VALUES (?1, 'open', ?2)",
                params![user_id, Utc::now().to_rfc3339()],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    DatabaseError::Conflict { user_id }
                } else {
                    DatabaseError::from(e)
                }
            })?;
            let sequence_id = tx.last_insert_rowid();
            tracing::info!(user_id, sequence_id, "sequence opened");
            Ok(sequence_id)
        })
    }

    pub fn find_open_sequence(&self, user_id: i64) -> Result<Option<i64>, DatabaseError> {
        let conn = self.lock()?;
        find_open(&conn, user_id)
    }

    /// Transition an open sequence to `completed`.
    ///
    /// # Errors
    /// [`DatabaseError::NotFound`] if the sequence is missing or not open.
    pub fn close_sequence(&self, sequence_id: i64) -> Result<(), DatabaseError> {
        self.atomic(|tx| {
            let updated = tx.execute(
                "UPDATE sequences SET status = 'completed', closed_at = ?2
                 WHERE id = ?1 AND status = 'open'",
                params![sequence_id, Utc::now().to_rfc3339()],
            )?;
            if updated == 0 {
                return Err(DatabaseError::NotFound { sequence_id });
            }
            tracing::info!(sequence_id, "sequence closed");
            Ok(())
        })
    }

    pub fn get_sequence(&self, sequence_id: i64) -> Result<Option<Sequence>, DatabaseError> {
        let conn = self.lock()?;
        let sequence = conn
            .query_row(
                "SELECT id, user_id, status, created_at, closed_at
                 FROM sequences WHERE id = ?1",
                params![sequence_id],
                row_to_sequence,
            )
            .optional()?;
        Ok(sequence)
    }

    /// All sequences of a user, newest first.
    pub fn list_sequences(&self, user_id: i64) -> Result<Vec<Sequence>, DatabaseError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, status, created_at, closed_at
             FROM sequences WHERE user_id = ?1 ORDER BY id DESC",
        )?;
        let sequences = stmt
            .query_map(params![user_id], row_to_sequence)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sequences)
    }

    // === Items ===

    /// Append an item to an open sequence and return its position.
    ///
    /// The position is `max(position) + 1`, starting at 1, computed and
    /// inserted in the same transaction as the open-status check.
    ///
    /// # Errors
    /// [`DatabaseError::NotFound`] if the sequence is missing or not open.
    pub fn append_item(
        &self,
        sequence_id: i64,
        kind: MediaKind,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<i64, DatabaseError> {
        self.atomic(|tx| {
            let status: Option<String> = tx
                .query_row(
                    "SELECT status FROM sequences WHERE id = ?1",
                    params![sequence_id],
                    |row| row.get(0),
                )
                .optional()?;
            if status.as_deref() != Some(SequenceStatus::Open.as_str()) {
                return Err(DatabaseError::NotFound { sequence_id });
            }

            let position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM items WHERE sequence_id = ?1",
                params![sequence_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO items (sequence_id, kind, payload_ref, caption, position, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    sequence_id,
                    kind.as_str(),
                    payload_ref,
                    caption,
                    position,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            tracing::debug!(sequence_id, position, %kind, "item appended");
            Ok(position)
        })
    }

    /// Items of a sequence in ascending position order.
    pub fn list_items_ordered(&self, sequence_id: i64) -> Result<Vec<Item>, DatabaseError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, sequence_id, kind, payload_ref, caption, position, created_at
             FROM items WHERE sequence_id = ?1 ORDER BY position ASC",
        )?;
        let items = stmt
            .query_map(params![sequence_id], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn count_items(&self, sequence_id: i64) -> Result<i64, DatabaseError> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE sequence_id = ?1",
            params![sequence_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete every item of a completed sequence.
    ///
    /// # Errors
    /// [`DatabaseError::NotFound`] if the sequence is missing or still open.
    pub fn purge_items(&self, sequence_id: i64) -> Result<usize, DatabaseError> {
        self.atomic(|tx| {
            let status: Option<String> = tx
                .query_row(
                    "SELECT status FROM sequences WHERE id = ?1",
                    params![sequence_id],
                    |row| row.get(0),
                )
                .optional()?;
            if status.as_deref() != Some(SequenceStatus::Completed.as_str()) {
                return Err(DatabaseError::NotFound { sequence_id });
            }
            let deleted = tx.execute(
                "DELETE FROM items WHERE sequence_id = ?1",
                params![sequence_id],
            )?;
            tracing::info!(sequence_id, deleted, "items purged");
            Ok(deleted)
        })
    }
}

fn find_open(conn: &Connection, user_id: i64) -> Result<Option<i64>, DatabaseError> {
    let id = conn
        .query_row(
            "SELECT id FROM sequences WHERE user_id = ?1 AND status = 'open'",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_timestamp(idx: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_sequence(row: &rusqlite::Row) -> Result<Sequence, rusqlite::Error> {
    let status_str: String = row.get(2)?;
    let status = SequenceStatus::parse(&status_str).ok_or_else(|| {
        conversion_error(
            2,
            std::io::Error::new(std::io::ErrorKind::InvalidData, status_str.clone()),
        )
    })?;
    let created_at: String = row.get(3)?;
    let closed_at: Option<String> = row.get(4)?;

    Ok(Sequence {
        id: row.get(0)?,
        user_id: row.get(1)?,
        status,
        created_at: parse_timestamp(3, &created_at)?,
        closed_at: closed_at.map(|s| parse_timestamp(4, &s)).transpose()?,
    })
}

fn row_to_item(row: &rusqlite::Row) -> Result<Item, rusqlite::Error> {
    let kind_str: String = row.get(2)?;
    let kind = kind_str
        .parse::<MediaKind>()
        .map_err(|e| conversion_error(2, e))?;
    let created_at: String = row.get(6)?;

    Ok(Item {
        id: row.get(0)?,
        sequence_id: row.get(1)?,
        kind,
        payload_ref: row.get(3)?,
        caption: row.get(4)?,
        position: row.get(5)?,
        created_at: parse_timestamp(6, &created_at)?,
    })
}
