use crate::error::{ChatError, ChatResult};
use crate::models::conversation::{Conversation, ConversationId, NewConversation};
use crate::models::message::Message;
use mongodb::bson::doc;
use mongodb::Collection;

pub const COLLECTION: &str = "conversations";

pub async fn save_conversation(
    conversation: &NewConversation,
    collection: &Collection<NewConversation>,
) -> ChatResult<ConversationId> {
    let result = collection.insert_one(conversation, None).await?;
    result
        .inserted_id
        .as_object_id()
        .map(ConversationId::from)
        .ok_or_else(|| ChatError::Store("conversation insert returned a non-ObjectId _id".into()))
}

pub async fn find_conversation(
    id: ConversationId,
    collection: &Collection<Conversation>,
) -> ChatResult<Option<Conversation>> {
    Ok(collection.find_one(doc! { "_id": id.oid() }, None).await?)
}

/// Conditional update: only matches while the stored pointer is older than
/// `message`, so a slow writer can never move it backwards.
pub async fn advance_last_message(
    id: ConversationId,
    message: &Message,
    collection: &Collection<Conversation>,
) -> ChatResult<bool> {
    let filter = doc! {
        "_id": id.oid(),
        "$or": [
            { "lastMessageAt": null },
            { "lastMessageAt": { "$lt": message.created_at } },
            { "lastMessageAt": message.created_at, "lastMessage": { "$lt": message.id.oid() } },
        ],
    };
    let update = doc! {
        "$set": {
            "lastMessage": message.id.oid(),
            "lastMessageAt": message.created_at,
        }
    };
    let result = collection.update_one(filter, update, None).await?;
    Ok(result.modified_count > 0)
}
