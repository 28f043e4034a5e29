use super::conversation::ConversationId;
use super::image::ImageId;
use super::participant::ParticipantId;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

super::object_id!(
    /// Id of a document in the `messages` collection. Ids are handed out in
    /// increasing order and break ties between equal `createdAt` values.
    MessageId,
    "message"
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageId>,
    #[serde(default)]
    pub read_by: Vec<ParticipantId>,
    pub created_at: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Message {
    /// Newest-first listings are ordered by this key, descending.
    pub fn sort_key(&self) -> (DateTime, MessageId) {
        (self.created_at, self.id)
    }
}

/// A message as written to the store; `_id` is assigned on insert.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: ParticipantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageId>,
    pub read_by: Vec<ParticipantId>,
    pub created_at: DateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl NewMessage {
    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: self.content,
            image: self.image,
            read_by: self.read_by,
            created_at: self.created_at,
            idempotency_key: self.idempotency_key,
        }
    }
}

/// Upper bound for a newest-first page. With `before_id` set, messages at
/// exactly `before` are still returned when their id is lower, so pages never
/// skip or repeat messages that share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub before: DateTime,
    pub before_id: Option<MessageId>,
}

impl Cursor {
    /// Cursor for the page that follows `message`.
    pub fn after(message: &Message) -> Self {
        Self {
            before: message.created_at,
            before_id: Some(message.id),
        }
    }

    pub fn admits(&self, message: &Message) -> bool {
        match self.before_id {
            Some(id) => message.sort_key() < (self.before, id),
            None => message.created_at < self.before,
        }
    }
}
