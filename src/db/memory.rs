use super::ChatStore;
use crate::error::{ChatError, ChatResult};
use crate::models::conversation::{Conversation, ConversationId, NewConversation};
use crate::models::image::{Image, ImageId, NewImage};
use crate::models::message::{Cursor, Message, MessageId, NewMessage};
use crate::models::participant::ParticipantId;
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Collections {
    conversations: HashMap<ConversationId, Conversation>,
    images: HashMap<ImageId, Image>,
    messages: HashMap<MessageId, Message>,
}

/// Process-local store with the same contract as the Mongo one. Every
/// operation runs under a single lock, which is what makes `add_reader` and
/// `advance_last_message` atomic here.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    pub async fn message_count(&self) -> usize {
        self.inner.lock().await.messages.len()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_conversation(&self, conversation: NewConversation) -> ChatResult<Conversation> {
        let mut inner = self.inner.lock().await;
        let conversation = conversation.into_conversation(ObjectId::new().into());
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation(&self, id: ConversationId) -> ChatResult<Option<Conversation>> {
        Ok(self.inner.lock().await.conversations.get(&id).cloned())
    }

    async fn advance_last_message(&self, id: ConversationId, message: &Message) -> ChatResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.conversations.get_mut(&id) {
            Some(conversation) if conversation.is_behind(message) => {
                conversation.last_message = Some(message.id);
                conversation.last_message_at = Some(message.created_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_image(&self, image: NewImage) -> ChatResult<Image> {
        let mut inner = self.inner.lock().await;
        let image = image.into_image(ObjectId::new().into());
        inner.images.insert(image.id, image.clone());
        Ok(image)
    }

    async fn find_image(&self, id: ImageId) -> ChatResult<Option<Image>> {
        Ok(self.inner.lock().await.images.get(&id).cloned())
    }

    async fn image_in_use(&self, id: ImageId) -> ChatResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.messages.values().any(|m| m.image == Some(id)))
    }

    async fn insert_message(&self, message: NewMessage) -> ChatResult<Message> {
        let mut inner = self.inner.lock().await;

        if let Some(image) = message.image {
            if inner.messages.values().any(|m| m.image == Some(image)) {
                return Err(ChatError::DuplicateKey(format!("image {image}")));
            }
        }
        if let Some(key) = &message.idempotency_key {
            let taken = inner.messages.values().any(|m| {
                m.conversation_id == message.conversation_id
                    && m.sender_id == message.sender_id
                    && m.idempotency_key.as_ref() == Some(key)
            });
            if taken {
                return Err(ChatError::DuplicateKey(format!("idempotency key {key}")));
            }
        }

        let message = message.into_message(ObjectId::new().into());
        inner.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_message(&self, id: MessageId) -> ChatResult<Option<Message>> {
        Ok(self.inner.lock().await.messages.get(&id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        conversation_id: ConversationId,
        sender_id: &ParticipantId,
        key: &str,
    ) -> ChatResult<Option<Message>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .values()
            .find(|m| {
                m.conversation_id == conversation_id
                    && &m.sender_id == sender_id
                    && m.idempotency_key.as_deref() == Some(key)
            })
            .cloned())
    }

    async fn add_reader(&self, id: MessageId, reader: &ParticipantId) -> ChatResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.messages.get_mut(&id) {
            Some(message) => {
                if !message.read_by.contains(reader) {
                    message.read_by.push(reader.clone());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> ChatResult<Vec<Message>> {
        let inner = self.inner.lock().await;
        let mut page: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| cursor.map_or(true, |c| c.admits(m)))
            .cloned()
            .collect();
        page.sort_by_key(|m| Reverse(m.sort_key()));
        page.truncate(limit);
        Ok(page)
    }

    async fn close(&self) {}
}
