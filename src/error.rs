use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use std::time::Duration;
use thiserror::Error;
use warp::http::StatusCode;

/// Mongo server code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChatError {
    #[error("sender id must be exactly 36 characters")]
    InvalidSender,

    #[error("reader id must be exactly 36 characters")]
    InvalidReader,

    #[error("conversation {0} not found")]
    ConversationNotFound(String),

    #[error("{0} is not a participant of this conversation")]
    NotAParticipant(String),

    #[error("image {0} not found")]
    AttachmentNotFound(String),

    #[error("image {0} is already attached to another message")]
    AttachmentInUse(String),

    #[error("message needs content or an image")]
    EmptyMessage,

    #[error("message {0} not found")]
    MessageNotFound(String),

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store error: {0}")]
    Store(String),

    /// Unique index violation reported by the store. The ledger turns this
    /// into an idempotent replay or `AttachmentInUse`.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// Stable code callers branch on.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::InvalidSender => "INVALID_SENDER",
            ChatError::InvalidReader => "INVALID_READER",
            ChatError::ConversationNotFound(_) => "CONVERSATION_NOT_FOUND",
            ChatError::NotAParticipant(_) => "NOT_A_PARTICIPANT",
            ChatError::AttachmentNotFound(_) => "ATTACHMENT_NOT_FOUND",
            ChatError::AttachmentInUse(_) => "ATTACHMENT_IN_USE",
            ChatError::EmptyMessage => "EMPTY_MESSAGE",
            ChatError::MessageNotFound(_) => "MESSAGE_NOT_FOUND",
            ChatError::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            ChatError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ChatError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ChatError::Store(_) => "STORE_ERROR",
            ChatError::DuplicateKey(_) => "DUPLICATE_KEY",
            ChatError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::InvalidSender
            | ChatError::InvalidReader
            | ChatError::EmptyMessage
            | ChatError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ChatError::NotAParticipant(_) => StatusCode::FORBIDDEN,
            ChatError::ConversationNotFound(_)
            | ChatError::AttachmentNotFound(_)
            | ChatError::MessageNotFound(_) => StatusCode::NOT_FOUND,
            ChatError::AttachmentInUse(_) | ChatError::DuplicateKey(_) => StatusCode::CONFLICT,
            ChatError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            ChatError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Store(_) | ChatError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Only transient infrastructure failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::StoreUnavailable(_))
    }
}

impl From<MongoError> for ChatError {
    fn from(e: MongoError) -> Self {
        match e.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE => {
                ChatError::DuplicateKey(write.message.clone())
            }
            ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. } => ChatError::StoreUnavailable(e.to_string()),
            _ => ChatError::Store(e.to_string()),
        }
    }
}
