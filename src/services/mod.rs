pub mod attachments;
pub mod ledger;
pub mod registry;

use crate::config::Config;
use crate::db::retry::RetryConfig;
use crate::db::ChatStore;
use crate::error::{ChatError, ChatResult};
use attachments::AttachmentStore;
use ledger::MessageLedger;
use registry::ConversationRegistry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Everything the RPC handlers need, built once at startup around the shared
/// store handle.
pub struct ChatService {
    pub ledger: MessageLedger,
    pub registry: ConversationRegistry,
    pub attachments: AttachmentStore,
    default_deadline: Duration,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, config: &Config) -> Self {
        Self::with_settings(store, config.read_retry.clone(), config.request_timeout)
    }

    pub fn with_settings(
        store: Arc<dyn ChatStore>,
        retry: RetryConfig,
        default_deadline: Duration,
    ) -> Self {
        let registry = ConversationRegistry::new(store.clone(), retry.clone());
        let attachments = AttachmentStore::new(store.clone(), retry.clone());
        let ledger = MessageLedger::new(store, registry.clone(), attachments.clone(), retry);
        Self {
            ledger,
            registry,
            attachments,
            default_deadline,
        }
    }

    /// Runs `operation` under the caller's deadline, or the configured one.
    /// Expiry drops the in-flight store round trip.
    pub async fn within<T, F>(&self, timeout_ms: Option<u64>, operation: F) -> ChatResult<T>
    where
        F: Future<Output = ChatResult<T>>,
    {
        let deadline = timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_deadline);
        tokio::time::timeout(deadline, operation)
            .await
            .map_err(|_| ChatError::DeadlineExceeded(deadline))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{participant, FaultyStore};
    use crate::models::conversation::ConversationId;
    use crate::models::message::MessageId;
    use crate::services::ledger::AppendRequest;

    #[tokio::test]
    async fn slow_store_hits_the_deadline() {
        let service = ChatService::with_settings(
            Arc::new(FaultyStore::slow(Duration::from_millis(200))),
            RetryConfig::default(),
            Duration::from_secs(5),
        );
        let a = participant();
        let conversation = service.registry.create(&[a.clone()]).await.unwrap();

        let result = service
            .within(
                Some(20),
                service.ledger.append(AppendRequest {
                    conversation_id: conversation.id,
                    sender_id: a,
                    content: Some("too slow".into()),
                    image_id: None,
                    idempotency_key: None,
                }),
            )
            .await;

        assert_eq!(
            result,
            Err(ChatError::DeadlineExceeded(Duration::from_millis(20)))
        );
    }

    #[tokio::test]
    async fn default_deadline_applies_without_caller_value() {
        let service = ChatService::with_settings(
            Arc::new(FaultyStore::slow(Duration::from_millis(200))),
            RetryConfig::default(),
            Duration::from_millis(10),
        );
        let a = participant();
        let conversation = service.registry.create(&[a]).await.unwrap();

        let result = service
            .within(None, service.ledger.latest(conversation.id))
            .await;
        assert!(matches!(result, Err(ChatError::DeadlineExceeded(_))));
    }

    async fn slow_service_with_message() -> (ChatService, ConversationId, MessageId, String) {
        let service = ChatService::with_settings(
            Arc::new(FaultyStore::slow(Duration::from_millis(200))),
            RetryConfig::default(),
            Duration::from_secs(5),
        );
        let a = participant();
        let b = participant();
        let conversation = service
            .registry
            .create(&[a.clone(), b.clone()])
            .await
            .unwrap();
        let message = service
            .ledger
            .append(AppendRequest {
                conversation_id: conversation.id,
                sender_id: a,
                content: Some("read me".into()),
                image_id: None,
                idempotency_key: None,
            })
            .await
            .unwrap();
        (service, conversation.id, message.id, b)
    }

    #[tokio::test]
    async fn mark_read_honors_the_deadline() {
        let (service, _, message_id, reader) = slow_service_with_message().await;

        let result = service
            .within(Some(20), service.ledger.mark_read(message_id, &reader))
            .await;

        assert_eq!(
            result,
            Err(ChatError::DeadlineExceeded(Duration::from_millis(20)))
        );
    }

    #[tokio::test]
    async fn listing_honors_the_deadline() {
        let (service, conversation_id, _, _) = slow_service_with_message().await;

        let result = service
            .within(
                Some(20),
                service.ledger.list_by_conversation(conversation_id, None, 10),
            )
            .await;

        assert_eq!(
            result,
            Err(ChatError::DeadlineExceeded(Duration::from_millis(20)))
        );
    }
}
