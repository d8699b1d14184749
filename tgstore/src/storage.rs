//! The storage façade consumed by the rest of a client.
//!
//! The [`Storage`] trait abstracts over session persistence so that the
//! invoke/session layer and the peer-resolution helpers never touch the
//! backing medium directly. The built-in implementation is
//! [`SqliteStorage`](crate::SqliteStorage); anything that can satisfy the
//! same contract (a remote KV store, a test double, …) can stand in for it.
//!
//! # Lifecycle
//!
//! `Closed → Open → Closed`, terminal. [`Storage::open`] creates or migrates
//! the schema and must complete before any other method is invoked;
//! [`Storage::close`] releases the backing handle; reopening requires a fresh
//! instance. Calling an accessor while closed is a programming error and
//! panics — it is never retried.
//!
//! Every method is a point operation: it begins, commits and returns within
//! a single call, so no lock is ever held across an async suspension point.
//! Async callers should wrap calls in `spawn_blocking`.

use crate::errors::StorageError;
use crate::peer::{InputPeer, PeerRecord};
use crate::state::UpdateState;

// ─── BatchReport ──────────────────────────────────────────────────────────────

/// Outcome of a best-effort batch write.
///
/// Cache population is enrichment, not the primary operation: individual row
/// failures are logged and counted here instead of being propagated, so a
/// failed peer upsert can never break the RPC call that triggered it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchReport {
    /// Rows written successfully.
    pub stored: usize,
    /// Rows that failed and were skipped.
    pub failed: usize,
}

impl BatchReport {
    /// `true` if every row in the batch was written.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

// ─── Storage ──────────────────────────────────────────────────────────────────

/// An abstraction over where and how session state is persisted.
///
/// Covers four concerns: the singleton session/auth record, the peer cache,
/// username-index maintenance, and update-stream resume checkpoints. All
/// durable writes commit before the call returns.
pub trait Storage: Send + Sync {
    // ── Lifecycle ──

    /// Open the backing store, creating or migrating the schema as needed.
    fn open(&self) -> Result<(), StorageError>;

    /// Stamp the current time into the session `date` and commit.
    fn save(&self) -> Result<(), StorageError>;

    /// Release the backing handle. Terminal: use a fresh instance to reopen.
    fn close(&self) -> Result<(), StorageError>;

    /// Remove the backing medium entirely. Only meaningful while closed.
    fn delete(&self) -> Result<(), StorageError>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;

    // ── Session record ──

    fn dc_id(&self) -> Result<Option<i32>, StorageError>;
    fn set_dc_id(&self, value: i32) -> Result<(), StorageError>;

    fn api_id(&self) -> Result<Option<i32>, StorageError>;
    fn set_api_id(&self, value: i32) -> Result<(), StorageError>;

    fn test_mode(&self) -> Result<Option<bool>, StorageError>;
    fn set_test_mode(&self, value: bool) -> Result<(), StorageError>;

    fn auth_key(&self) -> Result<Option<Vec<u8>>, StorageError>;
    fn set_auth_key(&self, value: &[u8]) -> Result<(), StorageError>;

    fn date(&self) -> Result<Option<i64>, StorageError>;
    fn set_date(&self, value: i64) -> Result<(), StorageError>;

    fn user_id(&self) -> Result<Option<i64>, StorageError>;
    fn set_user_id(&self, value: i64) -> Result<(), StorageError>;

    fn is_bot(&self) -> Result<Option<bool>, StorageError>;
    fn set_is_bot(&self, value: bool) -> Result<(), StorageError>;

    // ── Peer cache ──

    /// Insert-or-overwrite each peer row by id, best-effort per row.
    fn update_peers(&self, peers: &[PeerRecord]) -> Result<BatchReport, StorageError>;

    /// Record `(peer_id, username)` mappings in the expirable username index.
    ///
    /// For each peer id all prior index rows are deleted first, so after the
    /// call each peer in the batch owns exactly one index row.
    fn update_usernames(&self, entries: &[(i64, &str)]) -> Result<(), StorageError>;

    /// Exact lookup by peer id. No TTL.
    fn peer_by_id(&self, id: i64) -> Result<InputPeer, StorageError>;

    /// Resolve a username to a handle, honouring the 8-hour freshness TTL.
    ///
    /// A fresh row in the primary peer table always wins; a stale primary row
    /// falls through to the username index. Stale everywhere →
    /// [`StorageError::PeerExpired`]; unknown → [`StorageError::PeerNotFound`].
    fn peer_by_username(&self, username: &str) -> Result<InputPeer, StorageError>;

    /// Exact lookup by phone number. No TTL — phone numbers are not
    /// time-sensitive.
    fn peer_by_phone(&self, phone_number: &str) -> Result<InputPeer, StorageError>;

    // ── Update-state checkpoints ──

    /// All stored checkpoints, ordered by `date` ascending — the order shards
    /// must be resumed in to avoid gaps.
    fn update_states(&self) -> Result<Vec<UpdateState>, StorageError>;

    /// Upsert a checkpoint by its shard id.
    fn write_update_state(&self, state: &UpdateState) -> Result<(), StorageError>;

    /// Forget the checkpoint for a shard ("start from scratch" on resume).
    fn clear_update_state(&self, id: i64) -> Result<(), StorageError>;
}
