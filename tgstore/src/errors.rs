//! Error types for tgstore.

use std::fmt;

// ─── StorageError ─────────────────────────────────────────────────────────────

/// The error type returned by every fallible [`Storage`](crate::Storage)
/// operation.
///
/// [`PeerNotFound`](Self::PeerNotFound) and [`PeerExpired`](Self::PeerExpired)
/// are recoverable: the caller is expected to resolve the peer over the
/// network instead and feed the result back via
/// [`Storage::update_peers`](crate::Storage::update_peers). Everything else is
/// fatal to the operation that raised it.
#[derive(Debug)]
pub enum StorageError {
    /// The backing database could not be opened, created or migrated
    /// (missing permissions, corrupt file, failing PRAGMA, …).
    Open(rusqlite::Error),
    /// The stored schema version is newer than this library understands.
    ///
    /// Never silently downgraded — a newer library wrote this file.
    UnsupportedVersion { found: i32, supported: i32 },
    /// No cached peer matches the queried id, username or phone number.
    PeerNotFound(String),
    /// A matching row exists but its username mapping is older than
    /// [`SqliteStorage::USERNAME_TTL`](crate::SqliteStorage::USERNAME_TTL).
    PeerExpired(String),
    /// The stored peer type discriminant is not a known [`PeerKind`]
    /// (data corruption — should not occur under normal operation).
    ///
    /// [`PeerKind`]: crate::PeerKind
    InvalidPeerType(i64),
    /// Any other database failure.
    Sql(rusqlite::Error),
    /// Filesystem failure while removing the backing file.
    Io(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(e)            => write!(f, "failed to open session storage: {e}"),
            Self::UnsupportedVersion { found, supported } =>
                write!(f, "session schema v{found} is newer than supported v{supported}"),
            Self::PeerNotFound(key)  => write!(f, "peer not found: {key}"),
            Self::PeerExpired(key)   => write!(f, "peer expired: {key}"),
            Self::InvalidPeerType(t) => write!(f, "invalid peer type: {t}"),
            Self::Sql(e)             => write!(f, "database error: {e}"),
            Self::Io(e)              => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open(e) | Self::Sql(e) => Some(e),
            Self::Io(e)                  => Some(e),
            _                            => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self { Self::Sql(e) }
}

impl StorageError {
    /// Returns `true` if the caller can recover by resolving the peer over
    /// the network (not-found and expired cache entries).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PeerNotFound(_) | Self::PeerExpired(_))
    }
}
