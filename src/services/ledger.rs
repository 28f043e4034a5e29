use super::attachments::AttachmentStore;
use super::registry::ConversationRegistry;
use crate::db::retry::{with_retry, RetryConfig};
use crate::db::ChatStore;
use crate::error::{ChatError, ChatResult};
use crate::models::conversation::{Conversation, ConversationId};
use crate::models::image::{Image, ImageId};
use crate::models::message::{Cursor, Message, MessageId, NewMessage};
use crate::models::participant::ParticipantId;
use log::{debug, info, warn};
use mongodb::bson::DateTime;
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub conversation_id: ConversationId,
    pub sender_id: String,
    pub content: Option<String>,
    pub image_id: Option<ImageId>,
    /// Client token; a repeat from the same sender in the same conversation
    /// returns the original message.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub messages: Vec<Message>,
    /// Set when the page is full and older messages may remain.
    pub next: Option<Cursor>,
}

/// Per-conversation message sequence: validation, ordering and read state.
#[derive(Clone)]
pub struct MessageLedger {
    store: Arc<dyn ChatStore>,
    registry: ConversationRegistry,
    attachments: AttachmentStore,
    retry: RetryConfig,
}

impl MessageLedger {
    pub fn new(
        store: Arc<dyn ChatStore>,
        registry: ConversationRegistry,
        attachments: AttachmentStore,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            registry,
            attachments,
            retry,
        }
    }

    /// Validates and stores a message, then advances the conversation's
    /// `lastMessage`. Nothing is written unless every check passes.
    pub async fn append(&self, request: AppendRequest) -> ChatResult<Message> {
        let sender = ParticipantId::parse(&request.sender_id).ok_or(ChatError::InvalidSender)?;

        let conversation = self.registry.resolve(request.conversation_id).await?;
        if !conversation.is_participant(&sender) {
            return Err(ChatError::NotAParticipant(sender.to_string()));
        }

        let image = match request.image_id {
            Some(id) => Some(self.attachments.resolve(id).await?),
            None => None,
        };

        let content = trimmed(request.content.as_deref());
        if content.is_none() && image.is_none() {
            return Err(ChatError::EmptyMessage);
        }

        let idempotency_key = trimmed(request.idempotency_key.as_deref());
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.replay(conversation.id, &sender, key).await? {
                debug!("replaying message {} for key {}", existing.id, key);
                return Ok(existing);
            }
        }

        if let Some(image) = &image {
            if self.attachments.in_use(image.id).await? {
                return Err(ChatError::AttachmentInUse(image.id.to_string()));
            }
        }

        let new_message = NewMessage {
            conversation_id: conversation.id,
            sender_id: sender.clone(),
            content,
            image: image.as_ref().map(|i| i.id),
            read_by: Vec::new(),
            created_at: self.next_timestamp(conversation.id).await?,
            idempotency_key: idempotency_key.clone(),
        };

        let message = match self.store.insert_message(new_message).await {
            Ok(message) => message,
            Err(ChatError::DuplicateKey(detail)) => {
                return self
                    .resolve_duplicate(&conversation, &sender, idempotency_key.as_deref(), image, detail)
                    .await
            }
            Err(e) => return Err(e),
        };
        info!(
            "message {} appended to conversation {} by {}",
            message.id, conversation.id, sender
        );

        // The message is durable at this point. A stale pointer is repaired
        // by `reconcile_last_message`, so a failed update is not an error.
        match self.registry.set_last_message(conversation.id, &message).await {
            Ok(true) => {}
            Ok(false) => debug!(
                "lastMessage of {} already newer than {}",
                conversation.id, message.id
            ),
            Err(e) => warn!(
                "message {} stored but lastMessage of {} not updated: {}",
                message.id, conversation.id, e
            ),
        }

        Ok(message)
    }

    /// Adds `reader_id` to the message's read set. Marking twice is a no-op.
    pub async fn mark_read(&self, message_id: MessageId, reader_id: &str) -> ChatResult<()> {
        let message = self.resolve(message_id).await?;

        let reader = ParticipantId::parse(reader_id).ok_or(ChatError::InvalidReader)?;
        let conversation = self.registry.resolve(message.conversation_id).await?;
        if !conversation.is_participant(&reader) {
            return Err(ChatError::NotAParticipant(reader.to_string()));
        }

        if message.read_by.contains(&reader) {
            debug!("{} already read message {}", reader, message_id);
            return Ok(());
        }
        if !self.store.add_reader(message_id, &reader).await? {
            return Err(ChatError::MessageNotFound(message_id.to_string()));
        }
        debug!("{} read message {}", reader, message_id);
        Ok(())
    }

    pub async fn resolve(&self, id: MessageId) -> ChatResult<Message> {
        with_retry(&self.retry, "resolve message", || self.store.find_message(id))
            .await?
            .ok_or_else(|| ChatError::MessageNotFound(id.to_string()))
    }

    /// One page of the conversation, newest first. Feed `Page::next` back in
    /// as `cursor` to continue.
    pub async fn list_by_conversation(
        &self,
        conversation_id: ConversationId,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> ChatResult<Page> {
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(ChatError::InvalidArgument(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
            )));
        }
        self.registry.resolve(conversation_id).await?;

        let messages = with_retry(&self.retry, "list messages", || {
            self.store.list_messages(conversation_id, cursor, limit)
        })
        .await?;

        let next = if messages.len() == limit {
            messages.last().map(Cursor::after)
        } else {
            None
        };
        Ok(Page { messages, next })
    }

    pub async fn latest(&self, conversation_id: ConversationId) -> ChatResult<Option<Message>> {
        let mut newest = with_retry(&self.retry, "load latest message", || {
            self.store.list_messages(conversation_id, None, 1)
        })
        .await?;
        Ok(newest.pop())
    }

    /// Rebuilds `lastMessage` from the ledger when an earlier pointer update
    /// was lost.
    pub async fn reconcile_last_message(
        &self,
        conversation_id: ConversationId,
    ) -> ChatResult<Conversation> {
        let conversation = self.registry.resolve(conversation_id).await?;
        let latest = match self.latest(conversation_id).await? {
            Some(latest) => latest,
            None => return Ok(conversation),
        };
        if !conversation.is_behind(&latest) {
            return Ok(conversation);
        }

        self.registry.set_last_message(conversation_id, &latest).await?;
        info!(
            "lastMessage of {} repaired to {}",
            conversation_id, latest.id
        );
        self.registry.resolve(conversation_id).await
    }

    async fn replay(
        &self,
        conversation_id: ConversationId,
        sender: &ParticipantId,
        key: &str,
    ) -> ChatResult<Option<Message>> {
        with_retry(&self.retry, "look up idempotency key", || {
            self.store.find_by_idempotency_key(conversation_id, sender, key)
        })
        .await
    }

    /// Never earlier than the newest message already in the conversation, so
    /// createdAt stays monotonic even if the clock steps back.
    async fn next_timestamp(&self, conversation_id: ConversationId) -> ChatResult<DateTime> {
        let now = DateTime::now();
        Ok(match self.latest(conversation_id).await? {
            Some(latest) if latest.created_at > now => latest.created_at,
            _ => now,
        })
    }

    /// A concurrent writer won a unique index: either the same idempotency
    /// key or the same image.
    async fn resolve_duplicate(
        &self,
        conversation: &Conversation,
        sender: &ParticipantId,
        idempotency_key: Option<&str>,
        image: Option<Image>,
        detail: String,
    ) -> ChatResult<Message> {
        if let Some(key) = idempotency_key {
            if let Some(existing) = self.replay(conversation.id, sender, key).await? {
                return Ok(existing);
            }
        }
        match image {
            Some(image) => Err(ChatError::AttachmentInUse(image.id.to_string())),
            None => Err(ChatError::Store(detail)),
        }
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
