use serde::{Deserialize, Serialize};
use turngate_types::prelude::{Id, Timestamp, UserId};

use crate::errors::StorageError;

/// Recorded when a turn carries no explicit model identifier.
pub const DEFAULT_MODEL_TAG: &str = "groq";

/// One persisted exchange. Immutable after creation except for the single
/// `is_flagged` transition, which moderation may perform at most once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: Id,
    pub user_id: UserId,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: Timestamp,
    pub is_flagged: bool,
    pub model_used: String,
}

/// Input to `HistoryStore::append`. Id and timestamp are assigned by the
/// store so that per-user ordering stays under one authority.
#[derive(Clone, Debug)]
pub struct NewTurn {
    pub user_id: UserId,
    pub user_message: String,
    pub bot_response: String,
    pub model_used: Option<String>,
}

impl NewTurn {
    /// Trims both message fields and rejects the turn if either is empty
    /// afterwards. Returns the trimmed pair.
    pub fn validated_messages(&self) -> Result<(String, String), StorageError> {
        let user_message = self.user_message.trim();
        if user_message.is_empty() {
            return Err(StorageError::validation("user message empty after trim"));
        }
        let bot_response = self.bot_response.trim();
        if bot_response.is_empty() {
            return Err(StorageError::validation("bot response empty after trim"));
        }
        Ok((user_message.to_string(), bot_response.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(user_message: &str, bot_response: &str) -> NewTurn {
        NewTurn {
            user_id: UserId("user-model".into()),
            user_message: user_message.into(),
            bot_response: bot_response.into(),
            model_used: None,
        }
    }

    #[test]
    fn validation_trims_both_fields() {
        let (user_message, bot_response) = turn("  hi  ", "\nhello\n").validated_messages().unwrap();
        assert_eq!(user_message, "hi");
        assert_eq!(bot_response, "hello");
    }

    #[test]
    fn whitespace_only_bot_response_is_rejected() {
        let err = turn("hi", "   \t").validated_messages().expect_err("validation");
        assert_eq!(err.0.code, "SCHEMA.VALIDATION");
    }

    #[test]
    fn empty_user_message_is_rejected() {
        assert!(turn("", "hello").validated_messages().is_err());
    }
}
