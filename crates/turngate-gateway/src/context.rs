use std::sync::Arc;

use turngate_llm::prelude::Message;
use turngate_store::prelude::{HistoryStore, StorageError};
use turngate_types::prelude::UserId;

/// Builds the exact message sequence handed to the completion provider:
/// one system instruction, up to `window` most recent prior turns in
/// chronological order (a user and an assistant entry each), then the new
/// user message. Nothing downstream may reorder or truncate it.
pub struct ContextAssembler {
    store: Arc<dyn HistoryStore>,
    system_prompt: String,
    window: u32,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn HistoryStore>, system_prompt: String, window: u32) -> Self {
        Self {
            store,
            system_prompt,
            window,
        }
    }

    pub async fn assemble(
        &self,
        user: &UserId,
        user_message: &str,
    ) -> Result<Vec<Message>, StorageError> {
        let recent = self.store.list_recent(user, self.window).await?;

        let mut messages = Vec::with_capacity(2 + recent.len() * 2);
        messages.push(Message::system(self.system_prompt.clone()));
        // list_recent is newest first; the provider wants chronological.
        for turn in recent.iter().rev() {
            messages.push(Message::user(turn.user_message.clone()));
            messages.push(Message::assistant(turn.bot_response.clone()));
        }
        messages.push(Message::user(user_message));
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turngate_llm::prelude::Role;
    use turngate_store::prelude::{MemoryHistoryStore, NewTurn};

    const PROMPT: &str = "You are a helpful AI assistant.";

    fn assembler(store: &MemoryHistoryStore) -> ContextAssembler {
        ContextAssembler::new(Arc::new(store.clone()), PROMPT.into(), 5)
    }

    async fn seed(store: &MemoryHistoryStore, user: &UserId, count: usize) {
        for i in 0..count {
            store
                .append(NewTurn {
                    user_id: user.clone(),
                    user_message: format!("question {i}"),
                    bot_response: format!("answer {i}"),
                    model_used: None,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn empty_history_yields_system_plus_message() {
        let store = MemoryHistoryStore::new();
        let user = UserId("fresh".into());
        let messages = assembler(&store).assemble(&user, "hi").await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, PROMPT);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "hi");
    }

    #[tokio::test]
    async fn full_window_yields_eleven_chronological_entries() {
        let store = MemoryHistoryStore::new();
        let user = UserId("regular".into());
        seed(&store, &user, 8).await;

        let messages = assembler(&store).assemble(&user, "latest").await.unwrap();

        // system + 5 * (user, assistant) + new message
        assert_eq!(messages.len(), 11);
        assert_eq!(messages[0].role, Role::System);
        // Turns 3..=7 survive the window, oldest first.
        assert_eq!(messages[1].content, "question 3");
        assert_eq!(messages[2].content, "answer 3");
        assert_eq!(messages[9].content, "question 7");
        assert_eq!(messages[10].content, "latest");
        for pair in messages[1..10].chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    #[tokio::test]
    async fn short_history_is_included_whole() {
        let store = MemoryHistoryStore::new();
        let user = UserId("short".into());
        seed(&store, &user, 2).await;

        let messages = assembler(&store).assemble(&user, "next").await.unwrap();
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[1].content, "question 0");
        assert_eq!(messages[4].content, "answer 1");
    }
}
