use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use turngate_types::prelude::{now_ms, Id, Timestamp, UserId};

use crate::errors::StorageError;
use crate::history::HistoryStore;
use crate::model::{ChatTurn, NewTurn, DEFAULT_MODEL_TAG};

/// In-memory history store. Each user's turns live in one vector guarded by
/// a single write lock, which serializes same-user appends and lets readers
/// only ever observe fully constructed turns.
#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    inner: Arc<RwLock<HashMap<UserId, Vec<ChatTurn>>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, turn: NewTurn) -> Result<ChatTurn, StorageError> {
        let (user_message, bot_response) = turn.validated_messages()?;
        let model_used = turn
            .model_used
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL_TAG.to_string());

        let mut guard = self.inner.write();
        let log = guard.entry(turn.user_id.clone()).or_default();

        // Per-user timestamps must never regress, even if the wall clock does.
        let last_ts = log.last().map(|t| t.timestamp.0).unwrap_or(i64::MIN);
        let timestamp = Timestamp(now_ms().max(last_ts));

        let persisted = ChatTurn {
            id: Id::new_random(),
            user_id: turn.user_id,
            user_message,
            bot_response,
            timestamp,
            is_flagged: false,
            model_used,
        };
        log.push(persisted.clone());
        Ok(persisted)
    }

    async fn list_recent(&self, user: &UserId, limit: u32) -> Result<Vec<ChatTurn>, StorageError> {
        let guard = self.inner.read();
        let turns = guard
            .get(user)
            .map(|log| log.iter().rev().take(limit as usize).cloned().collect())
            .unwrap_or_default();
        Ok(turns)
    }

    async fn mark_flagged(&self, user: &UserId, id: &Id) -> Result<ChatTurn, StorageError> {
        let mut guard = self.inner.write();
        let log = guard
            .get_mut(user)
            .ok_or_else(|| StorageError::not_found("no history for user"))?;
        let turn = log
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| StorageError::not_found("turn not found"))?;
        turn.is_flagged = true;
        Ok(turn.clone())
    }

    async fn delete_all(&self, user: &UserId) -> Result<u64, StorageError> {
        let mut guard = self.inner.write();
        Ok(guard.remove(user).map(|log| log.len() as u64).unwrap_or(0))
    }
}
