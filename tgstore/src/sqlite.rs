//! SQLite-backed implementation of the [`Storage`] façade.
//!
//! One file per logical session, named `<session_name>.session`, in a
//! configurable working directory — or a throwaway in-memory database for
//! bots and tests that should always start fresh. Both backings share the
//! same schema and accessors; only `open`/`delete` differ.
//!
//! Durability class is write-ahead, normal sync (`journal_mode=WAL`,
//! `synchronous=NORMAL`): commits survive a process crash but not necessarily
//! a storage-media failure.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::StorageError;
use crate::peer::{InputPeer, PeerKind, PeerRecord};
use crate::schema;
use crate::state::UpdateState;
use crate::storage::{BatchReport, Storage};

// ─── SessionField ─────────────────────────────────────────────────────────────

/// Explicit field-keyed dispatch for the singleton session row. Column names
/// come from this trusted table only — never from caller input.
#[derive(Clone, Copy)]
enum SessionField {
    DcId,
    ApiId,
    TestMode,
    AuthKey,
    Date,
    UserId,
    IsBot,
}

impl SessionField {
    fn column(self) -> &'static str {
        match self {
            Self::DcId     => "dc_id",
            Self::ApiId    => "api_id",
            Self::TestMode => "test_mode",
            Self::AuthKey  => "auth_key",
            Self::Date     => "date",
            Self::UserId   => "user_id",
            Self::IsBot    => "is_bot",
        }
    }
}

// ─── SqliteStorage ────────────────────────────────────────────────────────────

enum Backing {
    File(PathBuf),
    Memory,
}

/// SQLite-backed session store.
///
/// The connection handle is owned exclusively by this value; concurrent
/// logical callers are serialized through the internal mutex, and every
/// operation acquires, commits and releases within a single call.
pub struct SqliteStorage {
    backing: Backing,
    conn:    Mutex<Option<Connection>>,
}

impl SqliteStorage {
    /// Extension appended to the session name to form the backing file name.
    pub const FILE_EXTENSION: &'static str = ".session";

    /// How long a cached username mapping stays trustworthy, in seconds.
    /// Usernames can be reassigned, so stale mappings must be re-resolved
    /// over the network instead of being returned.
    pub const USERNAME_TTL: i64 = 8 * 60 * 60;

    /// A store backed by `<workdir>/<name>.session`.
    pub fn file(name: &str, workdir: impl AsRef<Path>) -> Self {
        let path = workdir
            .as_ref()
            .join(format!("{name}{}", Self::FILE_EXTENSION));
        Self {
            backing: Backing::File(path),
            conn:    Mutex::new(None),
        }
    }

    /// An ephemeral in-memory store. `delete()` is a no-op.
    pub fn memory() -> Self {
        Self {
            backing: Backing::Memory,
            conn:    Mutex::new(None),
        }
    }

    /// Path of the backing file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File(path) => Some(path),
            Backing::Memory     => None,
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.conn.lock().unwrap();
        let conn = guard
            .as_mut()
            .expect("storage accessed while closed — call open() first");
        f(conn)
    }

    fn session_get<T: rusqlite::types::FromSql>(
        &self,
        field: SessionField,
    ) -> Result<Option<T>, StorageError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM sessions", field.column());
            let value = conn
                .query_row(&sql, [], |row| row.get::<_, Option<T>>(0))
                .optional()?;
            Ok(value.flatten())
        })
    }

    fn session_set<T: rusqlite::ToSql>(
        &self,
        field: SessionField,
        value: T,
    ) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let sql = format!("UPDATE sessions SET {} = ?1", field.column());
            conn.execute(&sql, params![value])?;
            Ok(())
        })
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn fresh(now: i64, seen: i64) -> bool {
    (now - seen).abs() <= SqliteStorage::USERNAME_TTL
}

/// `(id, access_hash, type, last_update_on)` as selected from `peers`.
type PeerRow = (i64, Option<i64>, i64, i64);

fn peer_row(row: &rusqlite::Row<'_>) -> Result<PeerRow, rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn handle_from_row(
    id: i64,
    access_hash: Option<i64>,
    code: i64,
) -> Result<InputPeer, StorageError> {
    let kind = PeerKind::from_code(code).ok_or(StorageError::InvalidPeerType(code))?;
    Ok(InputPeer::build(id, access_hash, kind))
}

impl Storage for SqliteStorage {
    // ── Lifecycle ──

    fn open(&self) -> Result<(), StorageError> {
        let mut guard = self.conn.lock().unwrap();
        assert!(guard.is_none(), "open() called on an already-open storage");

        let conn = match &self.backing {
            Backing::File(path) => {
                let existed = path.is_file();
                let mut conn = Connection::open(path).map_err(StorageError::Open)?;
                conn.execute_batch(
                    "PRAGMA journal_mode=WAL;\
                     PRAGMA synchronous=NORMAL;\
                     PRAGMA temp_store=1;",
                )
                .map_err(StorageError::Open)?;

                if existed {
                    schema::migrate(&mut conn)?;
                } else {
                    schema::create(&mut conn).map_err(StorageError::Open)?;
                }

                // Housekeeping only — correctness never depends on it.
                conn.execute_batch("VACUUM").map_err(StorageError::Open)?;
                tracing::info!("[storage] opened {}", path.display());
                conn
            }
            Backing::Memory => {
                let mut conn = Connection::open_in_memory().map_err(StorageError::Open)?;
                schema::create(&mut conn).map_err(StorageError::Open)?;
                conn
            }
        };

        *guard = Some(conn);
        Ok(())
    }

    fn save(&self) -> Result<(), StorageError> {
        self.session_set(SessionField::Date, unix_now())
    }

    fn close(&self) -> Result<(), StorageError> {
        let mut guard = self.conn.lock().unwrap();
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| StorageError::Sql(e))?;
        }
        Ok(())
    }

    fn delete(&self) -> Result<(), StorageError> {
        match &self.backing {
            Backing::File(path) => {
                if path.exists() {
                    std::fs::remove_file(path).map_err(StorageError::Io)?;
                    tracing::info!("[storage] deleted {}", path.display());
                }
                Ok(())
            }
            Backing::Memory => Ok(()),
        }
    }

    fn name(&self) -> &str {
        match self.backing {
            Backing::File(_) => "sqlite-file",
            Backing::Memory  => "sqlite-memory",
        }
    }

    // ── Session record ──

    fn dc_id(&self) -> Result<Option<i32>, StorageError> {
        self.session_get(SessionField::DcId)
    }

    fn set_dc_id(&self, value: i32) -> Result<(), StorageError> {
        self.session_set(SessionField::DcId, value)
    }

    fn api_id(&self) -> Result<Option<i32>, StorageError> {
        self.session_get(SessionField::ApiId)
    }

    fn set_api_id(&self, value: i32) -> Result<(), StorageError> {
        self.session_set(SessionField::ApiId, value)
    }

    fn test_mode(&self) -> Result<Option<bool>, StorageError> {
        self.session_get(SessionField::TestMode)
    }

    fn set_test_mode(&self, value: bool) -> Result<(), StorageError> {
        self.session_set(SessionField::TestMode, value)
    }

    fn auth_key(&self) -> Result<Option<Vec<u8>>, StorageError> {
        self.session_get(SessionField::AuthKey)
    }

    fn set_auth_key(&self, value: &[u8]) -> Result<(), StorageError> {
        self.session_set(SessionField::AuthKey, value)
    }

    fn date(&self) -> Result<Option<i64>, StorageError> {
        self.session_get(SessionField::Date)
    }

    fn set_date(&self, value: i64) -> Result<(), StorageError> {
        self.session_set(SessionField::Date, value)
    }

    fn user_id(&self) -> Result<Option<i64>, StorageError> {
        self.session_get(SessionField::UserId)
    }

    fn set_user_id(&self, value: i64) -> Result<(), StorageError> {
        self.session_set(SessionField::UserId, value)
    }

    fn is_bot(&self) -> Result<Option<bool>, StorageError> {
        self.session_get(SessionField::IsBot)
    }

    fn set_is_bot(&self, value: bool) -> Result<(), StorageError> {
        self.session_set(SessionField::IsBot, value)
    }

    // ── Peer cache ──

    fn update_peers(&self, peers: &[PeerRecord]) -> Result<BatchReport, StorageError> {
        self.with_conn(|conn| {
            let mut report = BatchReport::default();
            for peer in peers {
                let result = conn.execute(
                    "REPLACE INTO peers (id, access_hash, type, username, phone_number) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        peer.id,
                        peer.access_hash,
                        peer.kind.code(),
                        peer.username,
                        peer.phone_number,
                    ],
                );
                match result {
                    Ok(_) => report.stored += 1,
                    Err(e) => {
                        // Best-effort: cache population must never break the
                        // caller's primary operation.
                        tracing::warn!("[storage] failed to cache peer {}: {e}", peer.id);
                        report.failed += 1;
                    }
                }
            }
            Ok(report)
        })
    }

    fn update_usernames(&self, entries: &[(i64, &str)]) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for (peer_id, username) in entries {
                tx.execute("DELETE FROM usernames WHERE peer_id = ?1", params![peer_id])?;
                tx.execute(
                    "REPLACE INTO usernames (id, peer_id) VALUES (?1, ?2)",
                    params![username, peer_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn peer_by_id(&self, id: i64) -> Result<InputPeer, StorageError> {
        self.with_conn(|conn| {
            let row: Option<PeerRow> = conn
                .query_row(
                    "SELECT id, access_hash, type, last_update_on FROM peers WHERE id = ?1",
                    params![id],
                    peer_row,
                )
                .optional()?;

            let (id, hash, kind, _) =
                row.ok_or_else(|| StorageError::PeerNotFound(format!("id {id}")))?;
            handle_from_row(id, hash, kind)
        })
    }

    fn peer_by_username(&self, username: &str) -> Result<InputPeer, StorageError> {
        let now = unix_now();
        self.with_conn(|conn| {
            // (a) Primary peer table — known via an explicit resolve, wins
            // over the username index whenever it is fresh.
            let primary: Option<PeerRow> = conn
                .query_row(
                    "SELECT id, access_hash, type, last_update_on FROM peers \
                     WHERE username = ?1 ORDER BY last_update_on DESC",
                    params![username],
                    peer_row,
                )
                .optional()?;

            let mut saw_stale = false;
            if let Some((id, hash, kind, seen)) = primary {
                if fresh(now, seen) {
                    return handle_from_row(id, hash, kind);
                }
                saw_stale = true;
            }

            // (b) Expirable username index, re-resolved to the full peer row.
            let index: Option<(i64, i64)> = conn
                .query_row(
                    "SELECT peer_id, last_update_on FROM usernames \
                     WHERE id = ?1 ORDER BY last_update_on DESC",
                    params![username],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((peer_id, seen)) = index else {
                return Err(if saw_stale {
                    StorageError::PeerExpired(username.to_string())
                } else {
                    StorageError::PeerNotFound(username.to_string())
                });
            };
            if !fresh(now, seen) {
                return Err(StorageError::PeerExpired(username.to_string()));
            }

            let row: Option<PeerRow> = conn
                .query_row(
                    "SELECT id, access_hash, type, last_update_on FROM peers WHERE id = ?1",
                    params![peer_id],
                    peer_row,
                )
                .optional()?;

            let Some((id, hash, kind, seen)) = row else {
                return Err(if saw_stale {
                    StorageError::PeerExpired(username.to_string())
                } else {
                    StorageError::PeerNotFound(username.to_string())
                });
            };
            if !fresh(now, seen) {
                return Err(StorageError::PeerExpired(username.to_string()));
            }
            handle_from_row(id, hash, kind)
        })
    }

    fn peer_by_phone(&self, phone_number: &str) -> Result<InputPeer, StorageError> {
        self.with_conn(|conn| {
            let row: Option<PeerRow> = conn
                .query_row(
                    "SELECT id, access_hash, type, last_update_on FROM peers \
                     WHERE phone_number = ?1",
                    params![phone_number],
                    peer_row,
                )
                .optional()?;

            let (id, hash, kind, _) =
                row.ok_or_else(|| StorageError::PeerNotFound(format!("phone {phone_number}")))?;
            handle_from_row(id, hash, kind)
        })
    }

    // ── Update-state checkpoints ──

    fn update_states(&self) -> Result<Vec<UpdateState>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, pts, qts, date, seq FROM update_state ORDER BY date ASC",
            )?;
            let states = stmt
                .query_map([], |row| {
                    Ok(UpdateState {
                        id:   row.get(0)?,
                        pts:  row.get(1)?,
                        qts:  row.get(2)?,
                        date: row.get(3)?,
                        seq:  row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(states)
        })
    }

    fn write_update_state(&self, state: &UpdateState) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "REPLACE INTO update_state (id, pts, qts, date, seq) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![state.id, state.pts, state.qts, state.date, state.seq],
            )?;
            Ok(())
        })
    }

    fn clear_update_state(&self, id: i64) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM update_state WHERE id = ?1", params![id])?;
            Ok(())
        })
    }
}

// ─── Tests needing raw row access (backdating past the refresh trigger) ──────
