//! Database schema migrations for fileseq.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (fresh database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: users, sequences and items.
///
/// `UNIQUE(sequence_id, position)` backs the position counter.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sequences (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            status      TEXT NOT NULL CHECK (status IN ('open', 'completed')),
            created_at  TEXT NOT NULL,
            closed_at   TEXT
        );

        CREATE TABLE IF NOT EXISTS items (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            sequence_id INTEGER NOT NULL REFERENCES sequences(id),
            kind        TEXT NOT NULL,
            payload_ref TEXT NOT NULL,
            caption     TEXT,
            position    INTEGER NOT NULL CHECK (position > 0),
            created_at  TEXT NOT NULL,
            UNIQUE (sequence_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_sequences_user_status ON sequences(user_id, status);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: at most one open sequence per user, enforced by the database.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_sequences_one_open
             ON sequences(user_id) WHERE status = 'open';",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn second_open_sequence_violates_index() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (external_id, created_at) VALUES ('u', '')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO sequences (user_id, status, created_at) VALUES (1, 'open', '')",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO sequences (user_id, status, created_at) VALUES (1, 'open', '')",
            [],
        );
        assert!(second.is_err());
        conn.execute(
            "INSERT INTO sequences (user_id, status, created_at) VALUES (1, 'completed', '')",
            [],
        )
        .unwrap();
    }
}
