use crate::db::retry::{with_retry, RetryConfig};
use crate::db::ChatStore;
use crate::error::{ChatError, ChatResult};
use crate::models::image::{Image, ImageId, NewImage};
use log::info;
use std::sync::Arc;

/// Image metadata; the bytes themselves live in the external blob store.
#[derive(Clone)]
pub struct AttachmentStore {
    store: Arc<dyn ChatStore>,
    retry: RetryConfig,
}

impl AttachmentStore {
    pub fn new(store: Arc<dyn ChatStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub async fn register(&self, url: &str, file_id: Option<&str>) -> ChatResult<Image> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ChatError::InvalidArgument("image url is required".into()));
        }
        let file_id = file_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let image = self
            .store
            .insert_image(NewImage {
                url: url.to_string(),
                file_id,
            })
            .await?;
        info!("image {} registered", image.id);
        Ok(image)
    }

    pub async fn resolve(&self, id: ImageId) -> ChatResult<Image> {
        with_retry(&self.retry, "resolve image", || self.store.find_image(id))
            .await?
            .ok_or_else(|| ChatError::AttachmentNotFound(id.to_string()))
    }

    pub async fn in_use(&self, id: ImageId) -> ChatResult<bool> {
        with_retry(&self.retry, "check image usage", || self.store.image_in_use(id)).await
    }
}
