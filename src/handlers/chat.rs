use super::{error_reply, ok_reply};
use crate::error::{ChatError, ChatResult};
use crate::models::conversation::{Conversation, ConversationId};
use crate::models::image::{Image, ImageId};
use crate::models::message::{Cursor, Message, MessageId};
use crate::services::ledger::{AppendRequest, Page, DEFAULT_PAGE_SIZE};
use crate::services::ChatService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::Rejection;

type Response = warp::reply::Response;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub message_id: String,
    pub reader_id: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesRequest {
    pub conversation_id: String,
    #[serde(default)]
    pub before_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub before_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub participants: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterImageRequest {
    pub url: String,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetConversationRequest {
    pub conversation_id: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub message_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    pub read_by: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.to_string(),
            conversation_id: message.conversation_id.to_string(),
            sender_id: message.sender_id.to_string(),
            content: message.content.clone(),
            image_id: message.image.map(|id| id.to_string()),
            read_by: message.read_by.iter().map(|r| r.to_string()).collect(),
            created_at: message.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorView {
    pub before_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    pub messages: Vec<MessageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<CursorView>,
}

impl From<&Page> for ListMessagesResponse {
    fn from(page: &Page) -> Self {
        Self {
            messages: page.messages.iter().map(MessageView::from).collect(),
            next_cursor: page.next.map(|cursor| CursorView {
                before_timestamp: cursor.before.to_chrono(),
                before_id: cursor.before_id.map(|id| id.to_string()),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: String,
    pub participants: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
}

impl From<&Conversation> for ConversationView {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id.to_string(),
            participants: conversation
                .participants
                .iter()
                .map(|p| p.to_string())
                .collect(),
            last_message: conversation.last_message.map(|id| id.to_string()),
            last_message_at: conversation.last_message_at.map(|at| at.to_chrono()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl From<&Image> for ImageView {
    fn from(image: &Image) -> Self {
        Self {
            id: image.id.to_string(),
            url: image.url.clone(),
            file_id: image.file_id.clone(),
        }
    }
}

fn respond<T, V>(result: ChatResult<T>, view: impl FnOnce(&T) -> V) -> Response
where
    V: Serialize,
{
    match result {
        Ok(value) => ok_reply(&view(&value)),
        Err(e) => error_reply(&e),
    }
}

pub async fn send_message_handler(
    request: SendMessageRequest,
    service: Arc<ChatService>,
) -> Result<Response, Rejection> {
    let timeout = request.timeout_ms;
    let result = match append_request(request) {
        Ok(append) => service.within(timeout, service.ledger.append(append)).await,
        Err(e) => Err(e),
    };

    Ok(respond(result, |message| SendMessageResponse {
        message_id: message.id.to_string(),
        created_at: message.created_at.to_chrono(),
    }))
}

fn append_request(request: SendMessageRequest) -> ChatResult<AppendRequest> {
    let image_id = match request.image_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(ImageId::parse(raw)?),
        _ => None,
    };
    Ok(AppendRequest {
        conversation_id: ConversationId::parse(&request.conversation_id)?,
        sender_id: request.sender_id,
        content: request.content,
        image_id,
        idempotency_key: request.idempotency_key,
    })
}

pub async fn mark_read_handler(
    request: MarkReadRequest,
    service: Arc<ChatService>,
) -> Result<Response, Rejection> {
    let result = match MessageId::parse(&request.message_id) {
        Ok(message_id) => {
            service
                .within(
                    request.timeout_ms,
                    service.ledger.mark_read(message_id, &request.reader_id),
                )
                .await
        }
        Err(e) => Err(e),
    };

    Ok(respond(result, |_| serde_json::json!({})))
}

pub async fn list_messages_handler(
    request: ListMessagesRequest,
    service: Arc<ChatService>,
) -> Result<Response, Rejection> {
    let result = match list_arguments(&request) {
        Ok((conversation_id, cursor)) => {
            let limit = request.limit.unwrap_or(DEFAULT_PAGE_SIZE);
            service
                .within(
                    request.timeout_ms,
                    service
                        .ledger
                        .list_by_conversation(conversation_id, cursor, limit),
                )
                .await
        }
        Err(e) => Err(e),
    };

    Ok(respond(result, |page| ListMessagesResponse::from(page)))
}

fn list_arguments(request: &ListMessagesRequest) -> ChatResult<(ConversationId, Option<Cursor>)> {
    let conversation_id = ConversationId::parse(&request.conversation_id)?;
    let before_id = request
        .before_id
        .as_deref()
        .map(MessageId::parse)
        .transpose()?;

    let cursor = match (request.before_timestamp, before_id) {
        (Some(before), before_id) => Some(Cursor {
            before: mongodb::bson::DateTime::from_chrono(before),
            before_id,
        }),
        (None, Some(_)) => {
            return Err(ChatError::InvalidArgument(
                "beforeId needs beforeTimestamp".into(),
            ))
        }
        (None, None) => None,
    };
    Ok((conversation_id, cursor))
}

pub async fn create_conversation_handler(
    request: CreateConversationRequest,
    service: Arc<ChatService>,
) -> Result<Response, Rejection> {
    let result = service
        .within(
            request.timeout_ms,
            service.registry.create(&request.participants),
        )
        .await;

    Ok(respond(result, |conversation| ConversationView::from(conversation)))
}

pub async fn register_image_handler(
    request: RegisterImageRequest,
    service: Arc<ChatService>,
) -> Result<Response, Rejection> {
    let result = service
        .within(
            request.timeout_ms,
            service
                .attachments
                .register(&request.url, request.file_id.as_deref()),
        )
        .await;

    Ok(respond(result, |image| ImageView::from(image)))
}

pub async fn get_conversation_handler(
    request: GetConversationRequest,
    service: Arc<ChatService>,
) -> Result<Response, Rejection> {
    let result = match ConversationId::parse(&request.conversation_id) {
        Ok(id) => {
            service
                .within(request.timeout_ms, service.ledger.reconcile_last_message(id))
                .await
        }
        Err(e) => Err(e),
    };

    Ok(respond(result, |conversation| ConversationView::from(conversation)))
}
