use async_trait::async_trait;
use turngate_types::prelude::{Id, UserId};

use crate::errors::StorageError;
use crate::model::{ChatTurn, NewTurn};

/// Append-only per-user log of chat turns.
///
/// Implementations must make turns visible only once both message fields are
/// durably set, keep each user's turns totally ordered by timestamp, and
/// serialize appends for the same user. Different users carry no ordering
/// dependency on each other.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Validates, stamps id + timestamp, and appends. The returned turn is
    /// the persisted record.
    async fn append(&self, turn: NewTurn) -> Result<ChatTurn, StorageError>;

    /// The caller's most recent turns, newest first, capped at `limit`.
    async fn list_recent(&self, user: &UserId, limit: u32) -> Result<Vec<ChatTurn>, StorageError>;

    /// Sets `is_flagged` on one turn. The transition happens at most once;
    /// flagging an already-flagged turn is a no-op. Never clears.
    async fn mark_flagged(&self, user: &UserId, id: &Id) -> Result<ChatTurn, StorageError>;

    /// Removes every turn owned by `user`, returning how many were removed.
    async fn delete_all(&self, user: &UserId) -> Result<u64, StorageError>;
}
