use super::message::{Message, MessageId};
use super::participant::ParticipantId;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

super::object_id!(
    /// Id of a document in the `conversations` collection.
    ConversationId,
    "conversation"
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: ConversationId,
    pub participants: Vec<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessageId>,
    // createdAt of `last_message`; lets the pointer only move forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime>,
}

impl Conversation {
    pub fn is_participant(&self, participant: &ParticipantId) -> bool {
        self.participants.iter().any(|p| p == participant)
    }

    /// True when `message` sorts after whatever the pointer references now.
    pub fn is_behind(&self, message: &Message) -> bool {
        match (self.last_message_at, self.last_message) {
            (Some(at), Some(id)) => (at, id) < message.sort_key(),
            _ => true,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    pub participants: Vec<ParticipantId>,
}

impl NewConversation {
    pub fn into_conversation(self, id: ConversationId) -> Conversation {
        Conversation {
            id,
            participants: self.participants,
            last_message: None,
            last_message_at: None,
        }
    }
}
