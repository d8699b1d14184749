//! Cached peer identities and protocol-facing peer handles.
//!
//! A **peer** is any Telegram-addressable entity: a user, a bot, a basic
//! group, a channel or a supergroup. Telegram encodes the peer kind into the
//! sign and magnitude of the id itself (users positive, basic groups negated,
//! channels offset below [`MAX_CHANNEL_ID`]), and most kinds additionally
//! require an opaque per-peer **access hash** to be referenced in API calls.
//! The cache stores both so that API calls always carry correct access
//! hashes.

// ─── PeerKind ─────────────────────────────────────────────────────────────────

/// The kind of a cached peer, stored as an integer discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeerKind {
    User,
    Bot,
    Group,
    Channel,
    Supergroup,
}

impl PeerKind {
    /// The integer discriminant persisted in the `peers.type` column.
    pub fn code(self) -> i64 {
        match self {
            Self::User       => 0,
            Self::Bot        => 1,
            Self::Group      => 2,
            Self::Channel    => 3,
            Self::Supergroup => 4,
        }
    }

    /// Inverse of [`PeerKind::code`]. Returns `None` for unknown
    /// discriminants (corrupt or future data).
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::User,
            1 => Self::Bot,
            2 => Self::Group,
            3 => Self::Channel,
            4 => Self::Supergroup,
            _ => return None,
        })
    }
}

// ─── PeerRecord ───────────────────────────────────────────────────────────────

/// A peer identity as observed in an API response, ready to be cached.
///
/// `last_update_on` is deliberately absent: it is owned by the database
/// (column default on insert, refresh trigger on update) and never client-set.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerRecord {
    /// Telegram peer id; the sign encodes the kind for groups and channels.
    pub id:           i64,
    pub access_hash:  Option<i64>,
    pub kind:         PeerKind,
    pub username:     Option<String>,
    pub phone_number: Option<String>,
}

// ─── InputPeer ────────────────────────────────────────────────────────────────

/// Channel ids are stored as `MAX_CHANNEL_ID - bare_id`, so the bare id used
/// on the wire is recovered by the same subtraction.
pub const MAX_CHANNEL_ID: i64 = -1_000_000_000_000;

/// Recover the bare (wire-level) channel id from a stored peer id.
pub fn bare_channel_id(peer_id: i64) -> i64 {
    MAX_CHANNEL_ID - peer_id
}

/// A protocol-level peer handle, shaped by peer kind:
/// users and bots carry `(user_id, access_hash)`, basic groups carry only the
/// negated chat id, channels and supergroups carry the bare channel id plus
/// access hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputPeer {
    User    { user_id: i64, access_hash: i64 },
    Chat    { chat_id: i64 },
    Channel { channel_id: i64, access_hash: i64 },
}

impl InputPeer {
    /// Build the kind-appropriate handle from a cached peer row.
    ///
    /// A missing access hash is sent as `0`, which the protocol accepts for
    /// peers that do not require one (e.g. bots addressing users by id).
    pub fn build(id: i64, access_hash: Option<i64>, kind: PeerKind) -> Self {
        match kind {
            PeerKind::User | PeerKind::Bot => Self::User {
                user_id:     id,
                access_hash: access_hash.unwrap_or(0),
            },
            PeerKind::Group => Self::Chat { chat_id: -id },
            PeerKind::Channel | PeerKind::Supergroup => Self::Channel {
                channel_id:  bare_channel_id(id),
                access_hash: access_hash.unwrap_or(0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_round_trip() {
        for kind in [
            PeerKind::User,
            PeerKind::Bot,
            PeerKind::Group,
            PeerKind::Channel,
            PeerKind::Supergroup,
        ] {
            assert_eq!(PeerKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(PeerKind::from_code(99), None);
    }

    #[test]
    fn channel_id_derivation() {
        // -100xxxxxxxxxx is how channel peers appear in stored form.
        assert_eq!(bare_channel_id(-1_001_234_567_890), 1_234_567_890);
    }

    #[test]
    fn group_handle_negates_id() {
        let handle = InputPeer::build(-12345, None, PeerKind::Group);
        assert_eq!(handle, InputPeer::Chat { chat_id: 12345 });
    }
}
