use crate::db::retry::{with_retry, RetryConfig};
use crate::db::ChatStore;
use crate::error::{ChatError, ChatResult};
use crate::models::conversation::{Conversation, ConversationId, NewConversation};
use crate::models::message::Message;
use crate::models::participant::ParticipantId;
use log::info;
use std::sync::Arc;

/// Owns conversation membership and the `lastMessage` pointer.
#[derive(Clone)]
pub struct ConversationRegistry {
    store: Arc<dyn ChatStore>,
    retry: RetryConfig,
}

impl ConversationRegistry {
    pub fn new(store: Arc<dyn ChatStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Participants are trimmed, checked for length and deduplicated in
    /// first-seen order.
    pub async fn create(&self, participants: &[String]) -> ChatResult<Conversation> {
        let mut members: Vec<ParticipantId> = Vec::with_capacity(participants.len());
        for raw in participants {
            let id = ParticipantId::parse(raw).ok_or_else(|| {
                ChatError::InvalidArgument(format!(
                    "participant {raw:?} must be exactly 36 characters"
                ))
            })?;
            if !members.contains(&id) {
                members.push(id);
            }
        }
        if members.is_empty() {
            return Err(ChatError::InvalidArgument(
                "a conversation needs at least one participant".into(),
            ));
        }

        let conversation = self
            .store
            .insert_conversation(NewConversation {
                participants: members,
            })
            .await?;
        info!(
            "conversation {} created with {} participants",
            conversation.id,
            conversation.participants.len()
        );
        Ok(conversation)
    }

    pub async fn resolve(&self, id: ConversationId) -> ChatResult<Conversation> {
        with_retry(&self.retry, "resolve conversation", || {
            self.store.find_conversation(id)
        })
        .await?
        .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))
    }

    /// Moves the pointer to `message` if it is newer than the current target.
    /// Concurrent callers settle on the message that sorts last, whatever
    /// order their updates land in.
    pub async fn set_last_message(
        &self,
        conversation_id: ConversationId,
        message: &Message,
    ) -> ChatResult<bool> {
        if message.conversation_id != conversation_id {
            return Err(ChatError::InvalidArgument(format!(
                "message {} belongs to conversation {}, not {}",
                message.id, message.conversation_id, conversation_id
            )));
        }
        self.store.advance_last_message(conversation_id, message).await
    }
}
