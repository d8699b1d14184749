use rusqlite::Connection;
use tgstore::{
    InputPeer, PeerKind, PeerRecord, SqliteStorage, Storage, StorageError, UpdateState,
};

fn peer(id: i64, hash: i64, kind: PeerKind) -> PeerRecord {
    PeerRecord {
        id,
        access_hash:  Some(hash),
        kind,
        username:     None,
        phone_number: None,
    }
}

// ── Lifecycle & session record ────────────────────────────────────────────────

#[test]
fn fresh_open_creates_default_session() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::file("fresh", dir.path());
    storage.open().unwrap();

    assert!(storage.path().unwrap().is_file());
    assert_eq!(storage.dc_id().unwrap(), Some(2));
    assert_eq!(storage.date().unwrap(), Some(0));
    assert_eq!(storage.api_id().unwrap(), None);
    assert_eq!(storage.test_mode().unwrap(), None);
    assert_eq!(storage.auth_key().unwrap(), None);
    assert_eq!(storage.user_id().unwrap(), None);
    assert_eq!(storage.is_bot().unwrap(), None);
}

#[test]
fn session_values_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = vec![0xAB; 256];

    let storage = SqliteStorage::file("persist", dir.path());
    storage.open().unwrap();
    storage.set_dc_id(4).unwrap();
    storage.set_api_id(12345).unwrap();
    storage.set_test_mode(false).unwrap();
    storage.set_auth_key(&key).unwrap();
    storage.set_user_id(777_000).unwrap();
    storage.set_is_bot(true).unwrap();
    storage.close().unwrap();

    let storage = SqliteStorage::file("persist", dir.path());
    storage.open().unwrap();
    assert_eq!(storage.dc_id().unwrap(), Some(4));
    assert_eq!(storage.api_id().unwrap(), Some(12345));
    assert_eq!(storage.test_mode().unwrap(), Some(false));
    assert_eq!(storage.auth_key().unwrap(), Some(key));
    assert_eq!(storage.user_id().unwrap(), Some(777_000));
    assert_eq!(storage.is_bot().unwrap(), Some(true));
}

#[test]
fn save_stamps_date() {
    let storage = SqliteStorage::memory();
    storage.open().unwrap();
    assert_eq!(storage.date().unwrap(), Some(0));

    storage.save().unwrap();
    assert!(storage.date().unwrap().unwrap() > 0);
}

#[test]
fn delete_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::file("doomed", dir.path());
    storage.open().unwrap();
    let path = storage.path().unwrap().to_path_buf();
    assert!(path.is_file());

    storage.close().unwrap();
    storage.delete().unwrap();
    assert!(!path.exists());
}

#[test]
#[should_panic(expected = "closed")]
fn accessor_after_close_panics() {
    let storage = SqliteStorage::memory();
    storage.open().unwrap();
    storage.close().unwrap();
    let _ = storage.dc_id();
}

#[test]
fn garbage_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("junk{}", SqliteStorage::FILE_EXTENSION));
    std::fs::write(&path, b"this is not a database").unwrap();

    let storage = SqliteStorage::file("junk", dir.path());
    match storage.open() {
        Err(StorageError::Open(_)) => {}
        other => panic!("expected Open error, got {other:?}"),
    }
}

// ── Peer cache ────────────────────────────────────────────────────────────────

#[test]
fn handles_are_kind_shaped() {
    let storage = SqliteStorage::memory();
    storage.open().unwrap();

    let report = storage
        .update_peers(&[
            peer(100, 555, PeerKind::User),
            peer(101, 556, PeerKind::Bot),
            peer(-12345, 0, PeerKind::Group),
            peer(-1_001_234_567_890, 999, PeerKind::Channel),
            peer(-1_009_876_543_210, 888, PeerKind::Supergroup),
        ])
        .unwrap();
    assert_eq!(report.stored, 5);
    assert!(report.is_complete());

    assert_eq!(
        storage.peer_by_id(100).unwrap(),
        InputPeer::User { user_id: 100, access_hash: 555 },
    );
    assert_eq!(
        storage.peer_by_id(101).unwrap(),
        InputPeer::User { user_id: 101, access_hash: 556 },
    );
    assert_eq!(
        storage.peer_by_id(-12345).unwrap(),
        InputPeer::Chat { chat_id: 12345 },
    );
    assert_eq!(
        storage.peer_by_id(-1_001_234_567_890).unwrap(),
        InputPeer::Channel { channel_id: 1_234_567_890, access_hash: 999 },
    );
    assert_eq!(
        storage.peer_by_id(-1_009_876_543_210).unwrap(),
        InputPeer::Channel { channel_id: 9_876_543_210, access_hash: 888 },
    );
}

#[test]
fn unknown_peer_is_not_found() {
    let storage = SqliteStorage::memory();
    storage.open().unwrap();

    let err = storage.peer_by_id(42).unwrap_err();
    assert!(matches!(err, StorageError::PeerNotFound(_)));
    assert!(err.is_recoverable());
}

#[test]
fn resolve_by_username_and_phone() {
    let storage = SqliteStorage::memory();
    storage.open().unwrap();

    storage
        .update_peers(&[PeerRecord {
            id:           100,
            access_hash:  Some(555),
            kind:         PeerKind::User,
            username:     Some("alice".to_string()),
            phone_number: Some("441234567890".to_string()),
        }])
        .unwrap();

    let expected = InputPeer::User { user_id: 100, access_hash: 555 };
    assert_eq!(storage.peer_by_username("alice").unwrap(), expected);
    assert_eq!(storage.peer_by_phone("441234567890").unwrap(), expected);

    assert!(matches!(
        storage.peer_by_username("nobody"),
        Err(StorageError::PeerNotFound(_)),
    ));
    assert!(matches!(
        storage.peer_by_phone("000"),
        Err(StorageError::PeerNotFound(_)),
    ));
}

#[test]
fn repeated_upsert_is_last_write_wins() {
    let storage = SqliteStorage::memory();
    storage.open().unwrap();

    storage.update_peers(&[peer(100, 555, PeerKind::User)]).unwrap();
    storage.update_peers(&[peer(100, 556, PeerKind::User)]).unwrap();

    assert_eq!(
        storage.peer_by_id(100).unwrap(),
        InputPeer::User { user_id: 100, access_hash: 556 },
    );
}

#[test]
fn username_index_keeps_one_row_per_peer() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::file("usernames", dir.path());
    storage.open().unwrap();
    storage.update_peers(&[peer(100, 555, PeerKind::User)]).unwrap();

    storage.update_usernames(&[(100, "old_name")]).unwrap();
    storage.update_usernames(&[(100, "new_name")]).unwrap();

    let expected = InputPeer::User { user_id: 100, access_hash: 555 };
    assert_eq!(storage.peer_by_username("new_name").unwrap(), expected);
    assert!(matches!(
        storage.peer_by_username("old_name"),
        Err(StorageError::PeerNotFound(_)),
    ));
    storage.close().unwrap();

    // Exactly one index row survives for the peer.
    let conn = Connection::open(dir.path().join("usernames.session")).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM usernames WHERE peer_id = 100", [], |r| r.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

// ── Update-state checkpoints ──────────────────────────────────────────────────

#[test]
fn checkpoints_read_in_date_order() {
    let storage = SqliteStorage::memory();
    storage.open().unwrap();

    for (id, date) in [(1, 3000), (2, 1000), (3, 2000)] {
        storage
            .write_update_state(&UpdateState { id, pts: 10, qts: 0, date, seq: 0 })
            .unwrap();
    }

    let dates: Vec<i32> = storage
        .update_states()
        .unwrap()
        .iter()
        .map(|s| s.date)
        .collect();
    assert_eq!(dates, vec![1000, 2000, 3000]);
}

#[test]
fn checkpoint_upsert_and_clear() {
    let storage = SqliteStorage::memory();
    storage.open().unwrap();

    let first = UpdateState { id: 1, pts: 10, qts: 0, date: 1000, seq: 0 };
    storage.write_update_state(&first).unwrap();
    storage
        .write_update_state(&UpdateState { pts: 20, ..first })
        .unwrap();

    let states = storage.update_states().unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].pts, 20);

    storage.clear_update_state(1).unwrap();
    assert!(storage.update_states().unwrap().is_empty());
}

// ── Migration ladder ──────────────────────────────────────────────────────────

/// Lay down a file the way the library wrote it at schema v1: no `api_id`
/// column, no `usernames` table.
fn write_v1_store(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE sessions
        (
            dc_id     INTEGER PRIMARY KEY,
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

        CREATE TABLE version (number INTEGER PRIMARY KEY);

        INSERT INTO version VALUES (1);
        INSERT INTO sessions VALUES (2, NULL, NULL, 0, NULL, NULL);
        INSERT INTO peers (id, access_hash, type) VALUES (100, 555, 0);",
    )
    .unwrap();
}

fn stored_version(path: &std::path::Path) -> i32 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("SELECT number FROM version", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn migrates_v1_store_to_current() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("old{}", SqliteStorage::FILE_EXTENSION));
    write_v1_store(&path);

    let storage = SqliteStorage::file("old", dir.path());
    storage.open().unwrap();

    // v1 → v2 purged the stale-format peer cache.
    assert!(matches!(
        storage.peer_by_id(100),
        Err(StorageError::PeerNotFound(_)),
    ));

    // v2 → v3 added the api_id column.
    storage.set_api_id(999).unwrap();
    assert_eq!(storage.api_id().unwrap(), Some(999));

    // v3 → v4 created the username index.
    storage.update_peers(&[peer(200, 777, PeerKind::User)]).unwrap();
    storage.update_usernames(&[(200, "carol")]).unwrap();
    assert!(storage.peer_by_username("carol").is_ok());

    storage.close().unwrap();
    assert_eq!(stored_version(&path), 4);

    // Re-opening a migrated store is a no-op migration path.
    let storage = SqliteStorage::file("old", dir.path());
    storage.open().unwrap();
    assert_eq!(storage.api_id().unwrap(), Some(999));
    storage.close().unwrap();
    assert_eq!(stored_version(&path), 4);
}

#[test]
fn future_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::file("future", dir.path());
    storage.open().unwrap();
    let path = storage.path().unwrap().to_path_buf();
    storage.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute("UPDATE version SET number = 99", []).unwrap();
    drop(conn);

    let storage = SqliteStorage::file("future", dir.path());
    match storage.open() {
        Err(StorageError::UnsupportedVersion { found: 99, supported: 4 }) => {}
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }
}
