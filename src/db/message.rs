use crate::error::{ChatError, ChatResult};
use crate::models::conversation::ConversationId;
use crate::models::image::ImageId;
use crate::models::message::{Cursor, Message, MessageId, NewMessage};
use crate::models::participant::ParticipantId;
use futures_util::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{CountOptions, FindOptions, IndexOptions};
use mongodb::{Collection, IndexModel};

pub const COLLECTION: &str = "messages";

pub async fn save_message(
    message: &NewMessage,
    collection: &Collection<NewMessage>,
) -> ChatResult<MessageId> {
    let result = collection.insert_one(message, None).await?;
    result
        .inserted_id
        .as_object_id()
        .map(MessageId::from)
        .ok_or_else(|| ChatError::Store("message insert returned a non-ObjectId _id".into()))
}

pub async fn find_message(
    id: MessageId,
    collection: &Collection<Message>,
) -> ChatResult<Option<Message>> {
    Ok(collection.find_one(doc! { "_id": id.oid() }, None).await?)
}

pub async fn find_by_idempotency_key(
    conversation_id: ConversationId,
    sender_id: &ParticipantId,
    key: &str,
    collection: &Collection<Message>,
) -> ChatResult<Option<Message>> {
    let filter = doc! {
        "conversationId": conversation_id.oid(),
        "senderId": sender_id.as_str(),
        "idempotencyKey": key,
    };
    Ok(collection.find_one(filter, None).await?)
}

pub async fn image_in_use(
    image: ImageId,
    collection: &Collection<Message>,
) -> ChatResult<bool> {
    let options = CountOptions::builder().limit(1).build();
    let count = collection
        .count_documents(doc! { "image": image.oid() }, options)
        .await?;
    Ok(count > 0)
}

/// `$addToSet` keeps concurrent readers from overwriting each other.
pub async fn add_reader(
    id: MessageId,
    reader: &ParticipantId,
    collection: &Collection<Message>,
) -> ChatResult<bool> {
    let result = collection
        .update_one(
            doc! { "_id": id.oid() },
            doc! { "$addToSet": { "readBy": reader.as_str() } },
            None,
        )
        .await?;
    Ok(result.matched_count > 0)
}

pub async fn list_messages(
    conversation_id: ConversationId,
    cursor: Option<Cursor>,
    limit: usize,
    collection: &Collection<Message>,
) -> ChatResult<Vec<Message>> {
    let filter = page_filter(conversation_id, cursor);
    let options = FindOptions::builder()
        .sort(doc! { "createdAt": -1, "_id": -1 })
        .limit(limit as i64)
        .build();

    let cursor = collection.find(filter, options).await?;
    Ok(cursor.try_collect::<Vec<_>>().await?)
}

fn page_filter(conversation_id: ConversationId, cursor: Option<Cursor>) -> Document {
    let conversation = conversation_id.oid();
    match cursor {
        None => doc! { "conversationId": conversation },
        Some(Cursor {
            before,
            before_id: None,
        }) => doc! { "conversationId": conversation, "createdAt": { "$lt": before } },
        Some(Cursor {
            before,
            before_id: Some(id),
        }) => doc! {
            "conversationId": conversation,
            "$or": [
                { "createdAt": { "$lt": before } },
                { "createdAt": before, "_id": { "$lt": id.oid() } },
            ],
        },
    }
}

pub fn indexes() -> Vec<IndexModel> {
    vec![
        IndexModel::builder()
            .keys(doc! { "conversationId": 1, "createdAt": -1, "_id": -1 })
            .build(),
        IndexModel::builder().keys(doc! { "senderId": 1 }).build(),
        // An image belongs to at most one message.
        IndexModel::builder()
            .keys(doc! { "image": 1 })
            .options(
                IndexOptions::builder()
                    .name("image_unique".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { "image": { "$exists": true } })
                    .build(),
            )
            .build(),
        IndexModel::builder()
            .keys(doc! { "conversationId": 1, "senderId": 1, "idempotencyKey": 1 })
            .options(
                IndexOptions::builder()
                    .name("idempotency_unique".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { "idempotencyKey": { "$exists": true } })
                    .build(),
            )
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use mongodb::bson::DateTime;

    #[test]
    fn first_page_filters_on_conversation_only() {
        let conversation: ConversationId = ObjectId::new().into();
        let filter = page_filter(conversation, None);
        assert_eq!(filter, doc! { "conversationId": conversation.oid() });
    }

    #[test]
    fn cursor_with_id_adds_tie_break_clause() {
        let conversation: ConversationId = ObjectId::new().into();
        let id: MessageId = ObjectId::new().into();
        let before = DateTime::from_millis(42);
        let filter = page_filter(
            conversation,
            Some(Cursor {
                before,
                before_id: Some(id),
            }),
        );
        let clauses = filter.get_array("$or").expect("tie-break clauses");
        assert_eq!(clauses.len(), 2);
    }
}
