use crate::config::{Config, StoreKind};
use crate::error::ChatResult;
use crate::models::conversation::{Conversation, ConversationId, NewConversation};
use crate::models::image::{Image, ImageId, NewImage};
use crate::models::message::{Cursor, Message, MessageId, NewMessage};
use crate::models::participant::ParticipantId;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

pub mod conversation;
pub mod image;
pub mod memory;
pub mod message;
pub mod mongo;
pub mod retry;

#[cfg(test)]
pub mod testing;

/// Document store behind the chat service. Implementations are the only
/// arbitration point for concurrent writers.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_conversation(&self, conversation: NewConversation) -> ChatResult<Conversation>;

    async fn find_conversation(&self, id: ConversationId) -> ChatResult<Option<Conversation>>;

    /// Points `lastMessage` at `message` unless it already references a
    /// message that sorts later. Returns whether the pointer moved.
    async fn advance_last_message(&self, id: ConversationId, message: &Message) -> ChatResult<bool>;

    async fn insert_image(&self, image: NewImage) -> ChatResult<Image>;

    async fn find_image(&self, id: ImageId) -> ChatResult<Option<Image>>;

    async fn image_in_use(&self, id: ImageId) -> ChatResult<bool>;

    /// Fails with `DuplicateKey` when the image is already referenced or the
    /// idempotency key was already used by this sender in this conversation.
    async fn insert_message(&self, message: NewMessage) -> ChatResult<Message>;

    async fn find_message(&self, id: MessageId) -> ChatResult<Option<Message>>;

    async fn find_by_idempotency_key(
        &self,
        conversation_id: ConversationId,
        sender_id: &ParticipantId,
        key: &str,
    ) -> ChatResult<Option<Message>>;

    /// Atomic add-if-absent on `readBy`. Returns false when the message does
    /// not exist.
    async fn add_reader(&self, id: MessageId, reader: &ParticipantId) -> ChatResult<bool>;

    /// Newest first, ties broken by id, at most `limit` entries.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> ChatResult<Vec<Message>>;

    async fn close(&self);
}

/// Opens the configured store once for the lifetime of the process.
pub async fn open(config: &Config) -> ChatResult<Arc<dyn ChatStore>> {
    match config.store {
        StoreKind::Mongo => {
            let store = mongo::MongoStore::connect(&config.mongo_uri).await?;
            store.ensure_indexes().await?;
            info!("connected to MongoDB database {}", store.database_name());
            Ok(Arc::new(store))
        }
        StoreKind::Memory => {
            info!("using in-memory store, data will not survive a restart");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
    }
}
