//! Fault-injecting store and fixtures shared by the service and handler tests.

use super::memory::MemoryStore;
use super::ChatStore;
use crate::error::{ChatError, ChatResult};
use crate::models::conversation::{Conversation, ConversationId, NewConversation};
use crate::models::image::{Image, ImageId, NewImage};
use crate::models::message::{Cursor, Message, MessageId, NewMessage};
use crate::models::participant::ParticipantId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

pub fn participant() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Wraps a `MemoryStore`, failing the next N reads with `StoreUnavailable`,
/// optionally failing pointer updates and delaying every call.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    read_failures: AtomicU32,
    reads: AtomicU32,
    fail_pointer: AtomicBool,
    delay: Option<Duration>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_next_reads(&self, n: u32) {
        self.read_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_pointer_updates(&self, fail: bool) {
        self.fail_pointer.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    async fn read(&self) -> ChatResult<()> {
        self.pause().await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let pending = self.read_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.read_failures.store(pending - 1, Ordering::SeqCst);
            return Err(ChatError::StoreUnavailable("injected".into()));
        }
        Ok(())
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ChatStore for FaultyStore {
    async fn insert_conversation(&self, conversation: NewConversation) -> ChatResult<Conversation> {
        self.pause().await;
        self.inner.insert_conversation(conversation).await
    }

    async fn find_conversation(&self, id: ConversationId) -> ChatResult<Option<Conversation>> {
        self.read().await?;
        self.inner.find_conversation(id).await
    }

    async fn advance_last_message(&self, id: ConversationId, message: &Message) -> ChatResult<bool> {
        self.pause().await;
        if self.fail_pointer.load(Ordering::SeqCst) {
            return Err(ChatError::StoreUnavailable("injected".into()));
        }
        self.inner.advance_last_message(id, message).await
    }

    async fn insert_image(&self, image: NewImage) -> ChatResult<Image> {
        self.pause().await;
        self.inner.insert_image(image).await
    }

    async fn find_image(&self, id: ImageId) -> ChatResult<Option<Image>> {
        self.read().await?;
        self.inner.find_image(id).await
    }

    async fn image_in_use(&self, id: ImageId) -> ChatResult<bool> {
        self.read().await?;
        self.inner.image_in_use(id).await
    }

    async fn insert_message(&self, message: NewMessage) -> ChatResult<Message> {
        self.pause().await;
        self.inner.insert_message(message).await
    }

    async fn find_message(&self, id: MessageId) -> ChatResult<Option<Message>> {
        self.read().await?;
        self.inner.find_message(id).await
    }

    async fn find_by_idempotency_key(
        &self,
        conversation_id: ConversationId,
        sender_id: &ParticipantId,
        key: &str,
    ) -> ChatResult<Option<Message>> {
        self.read().await?;
        self.inner
            .find_by_idempotency_key(conversation_id, sender_id, key)
            .await
    }

    async fn add_reader(&self, id: MessageId, reader: &ParticipantId) -> ChatResult<bool> {
        self.pause().await;
        self.inner.add_reader(id, reader).await
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> ChatResult<Vec<Message>> {
        self.read().await?;
        self.inner.list_messages(conversation_id, cursor, limit).await
    }

    async fn close(&self) {}
}
