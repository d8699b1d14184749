//! Update-stream resume checkpoints.
//!
//! The Telegram MTProto protocol assigns monotonically-increasing sequence
//! numbers called **pts** (and **qts** for secret chats, **seq** for the
//! combined updates container) to each update. Persisting the last seen
//! counters lets a client resume the update stream after a reconnect and
//! fetch exactly the missed range via `updates.getDifference`, with no loss
//! and no duplication.

/// One persisted resume checkpoint, keyed by a caller-chosen shard id.
///
/// A shard with no stored checkpoint means "start from scratch". Checkpoints
/// must be restored in ascending `date` order to avoid gaps — that order is
/// what [`Storage::update_states`](crate::Storage::update_states) returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdateState {
    /// Caller-chosen id of the logical connection/shard being tracked.
    pub id: i64,
    /// Main sequence counter (messages, channels).
    pub pts: i32,
    /// Secondary counter for secret chats.
    pub qts: i32,
    /// Date of the last known update (Unix timestamp).
    pub date: i32,
    /// Combined updates sequence.
    pub seq: i32,
}
