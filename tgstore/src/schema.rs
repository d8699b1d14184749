//! On-disk schema and the forward-only migration ladder.
//!
//! A fresh store is created with the full current schema in one transaction.
//! An existing store is brought forward one version at a time; each step and
//! its version bump commit together, so a crash between steps leaves the
//! store at a consistent, resumable version. Steps are never reordered or
//! skipped.

use rusqlite::{Connection, Transaction};

use crate::errors::StorageError;

/// Schema version written by [`create`] and targeted by [`migrate`].
pub(crate) const CURRENT_VERSION: i32 = 4;

/// DC the default session row points at before the first connect.
pub(crate) const DEFAULT_DC_ID: i32 = 2;

const SCHEMA: &str = "\
CREATE TABLE sessions
(
    dc_id     INTEGER PRIMARY KEY,
    api_id    INTEGER,
    test_mode INTEGER,
    auth_key  BLOB,
    date      INTEGER NOT NULL,
    user_id   INTEGER,
    is_bot    INTEGER
);

CREATE TABLE peers
(
    id             INTEGER PRIMARY KEY,
    access_hash    INTEGER,
    type           INTEGER NOT NULL,
    username       TEXT,
    phone_number   TEXT,
    last_update_on INTEGER NOT NULL DEFAULT (CAST(STRFTIME('%s', 'now') AS INTEGER))
);

CREATE TABLE update_state
(
    id   INTEGER PRIMARY KEY,
    pts  INTEGER,
    qts  INTEGER,
    date INTEGER,
    seq  INTEGER
);

CREATE TABLE version
(
    number INTEGER PRIMARY KEY
);

CREATE INDEX idx_peers_id ON peers (id);
CREATE INDEX idx_peers_username ON peers (username);
CREATE INDEX idx_peers_phone_number ON peers (phone_number);

CREATE TRIGGER trg_peers_last_update_on
    AFTER UPDATE
    ON peers
BEGIN
    UPDATE peers
    SET last_update_on = CAST(STRFTIME('%s', 'now') AS INTEGER)
    WHERE id = NEW.id;
END;
";

// Idempotent DDL: also applied as the v3 -> v4 migration step on stores that
// predate the username index.
const USERNAMES_SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS usernames
(
    id             TEXT PRIMARY KEY,
    peer_id        INTEGER NOT NULL,
    last_update_on INTEGER NOT NULL DEFAULT (CAST(STRFTIME('%s', 'now') AS INTEGER))
);

CREATE INDEX IF NOT EXISTS idx_usernames_peer_id ON usernames (peer_id);

CREATE TRIGGER IF NOT EXISTS trg_usernames_last_update_on
    AFTER UPDATE
    ON usernames
BEGIN
    UPDATE usernames
    SET last_update_on = CAST(STRFTIME('%s', 'now') AS INTEGER)
    WHERE id = NEW.id;
END;
";

/// Create the full current schema, stamp the version and insert the default
/// session row. One transaction: either the store comes up complete or not
/// at all.
pub(crate) fn create(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.execute_batch(USERNAMES_SCHEMA)?;
    tx.execute("INSERT INTO version VALUES (?1)", [CURRENT_VERSION])?;
    tx.execute(
        "INSERT INTO sessions VALUES (?1, NULL, NULL, NULL, 0, NULL, NULL)",
        [DEFAULT_DC_ID],
    )?;
    tx.commit()?;
    tracing::info!("[storage] created schema v{CURRENT_VERSION}");
    Ok(())
}

/// Bring an existing store up to [`CURRENT_VERSION`], one committed step at
/// a time.
pub(crate) fn migrate(conn: &mut Connection) -> Result<(), StorageError> {
    let found: i32 = conn
        .query_row("SELECT number FROM version", [], |row| row.get(0))
        .map_err(StorageError::Open)?;

    if found > CURRENT_VERSION || found < 1 {
        return Err(StorageError::UnsupportedVersion {
            found,
            supported: CURRENT_VERSION,
        });
    }

    for from in found..CURRENT_VERSION {
        let tx = conn.transaction().map_err(StorageError::Open)?;
        step(&tx, from).map_err(StorageError::Open)?;
        tx.execute("UPDATE version SET number = ?1", [from + 1])
            .map_err(StorageError::Open)?;
        tx.commit().map_err(StorageError::Open)?;
        tracing::info!("[storage] schema migrated v{from} → v{}", from + 1);
    }

    Ok(())
}

fn step(tx: &Transaction<'_>, from: i32) -> Result<(), rusqlite::Error> {
    match from {
        // Peer ids changed format; purge the cache and force re-resolution.
        1 => {
            tx.execute("DELETE FROM peers", [])?;
        }
        2 => {
            tx.execute("ALTER TABLE sessions ADD api_id INTEGER", [])?;
        }
        3 => {
            tx.execute_batch(USERNAMES_SCHEMA)?;
        }
        other => unreachable!("no migration step from v{other}"),
    }
    Ok(())
}
