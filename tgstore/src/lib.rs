//! # tgstore
//!
//! SQLite session storage for Telegram MTProto clients.
//!
//! Everything a client needs to persist between runs lives here, behind the
//! [`Storage`] façade:
//! - Session/auth record — DC id, API id, test mode, the long-lived auth key,
//!   signed-in user identity
//! - Peer access-hash cache — resolve chats/users by id, `@username` or phone
//!   without a network round trip; API calls always carry correct access
//!   hashes
//! - Expirable username index — `@username` mappings go stale after 8 hours
//!   and are re-resolved instead of trusted forever
//! - Update-state checkpoints — pts/qts/seq/date per shard, to resume the
//!   update stream after reconnect with no loss and no duplication
//! - Versioned schema with a forward-only migration ladder
//!
//! ## Example
//!
//! ```no_run
//! use tgstore::{SqliteStorage, Storage};
//!
//! let storage = SqliteStorage::file("my_account", "./");
//! storage.open()?;
//! let dc = storage.dc_id()?;           // Some(2) on a fresh session
//! storage.save()?;
//! storage.close()?;
//! # Ok::<(), tgstore::StorageError>(())
//! ```

#![deny(unsafe_code)]

mod errors;
mod peer;
mod schema;
mod sqlite;
mod state;
mod storage;

pub use errors::StorageError;
pub use peer::{InputPeer, MAX_CHANNEL_ID, PeerKind, PeerRecord, bare_channel_id};
pub use sqlite::SqliteStorage;
pub use state::UpdateState;
pub use storage::{BatchReport, Storage};
