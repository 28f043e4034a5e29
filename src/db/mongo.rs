use super::{conversation, image, message, ChatStore};
use crate::error::ChatResult;
use crate::models::conversation::{Conversation, ConversationId, NewConversation};
use crate::models::image::{Image, ImageId, NewImage};
use crate::models::message::{Cursor, Message, MessageId, NewMessage};
use crate::models::participant::ParticipantId;
use async_trait::async_trait;
use log::{debug, info};
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};

const DEFAULT_DATABASE: &str = "shm_chat";

pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connects and pings the server so a bad URI fails at startup rather
    /// than on the first request.
    pub async fn connect(uri: &str) -> ChatResult<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        let client = Client::with_options(options)?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));

        db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(Self { client, db })
    }

    pub fn database_name(&self) -> &str {
        self.db.name()
    }

    pub async fn ensure_indexes(&self) -> ChatResult<()> {
        let messages = self.db.collection::<Message>(message::COLLECTION);
        for index in message::indexes() {
            let created = messages.create_index(index, None).await?;
            debug!("index {} ready on {}", created.index_name, message::COLLECTION);
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MongoStore {
    async fn insert_conversation(&self, conversation: NewConversation) -> ChatResult<Conversation> {
        let collection = self.db.collection::<NewConversation>(conversation::COLLECTION);
        let id = conversation::save_conversation(&conversation, &collection).await?;
        Ok(conversation.into_conversation(id))
    }

    async fn find_conversation(&self, id: ConversationId) -> ChatResult<Option<Conversation>> {
        let collection = self.db.collection::<Conversation>(conversation::COLLECTION);
        conversation::find_conversation(id, &collection).await
    }

    async fn advance_last_message(&self, id: ConversationId, message: &Message) -> ChatResult<bool> {
        let collection = self.db.collection::<Conversation>(conversation::COLLECTION);
        conversation::advance_last_message(id, message, &collection).await
    }

    async fn insert_image(&self, new_image: NewImage) -> ChatResult<Image> {
        let collection = self.db.collection::<NewImage>(image::COLLECTION);
        let id = image::save_image(&new_image, &collection).await?;
        Ok(new_image.into_image(id))
    }

    async fn find_image(&self, id: ImageId) -> ChatResult<Option<Image>> {
        let collection = self.db.collection::<Image>(image::COLLECTION);
        image::find_image(id, &collection).await
    }

    async fn image_in_use(&self, id: ImageId) -> ChatResult<bool> {
        let collection = self.db.collection::<Message>(message::COLLECTION);
        message::image_in_use(id, &collection).await
    }

    async fn insert_message(&self, new_message: NewMessage) -> ChatResult<Message> {
        let collection = self.db.collection::<NewMessage>(message::COLLECTION);
        let id = message::save_message(&new_message, &collection).await?;
        Ok(new_message.into_message(id))
    }

    async fn find_message(&self, id: MessageId) -> ChatResult<Option<Message>> {
        let collection = self.db.collection::<Message>(message::COLLECTION);
        message::find_message(id, &collection).await
    }

    async fn find_by_idempotency_key(
        &self,
        conversation_id: ConversationId,
        sender_id: &ParticipantId,
        key: &str,
    ) -> ChatResult<Option<Message>> {
        let collection = self.db.collection::<Message>(message::COLLECTION);
        message::find_by_idempotency_key(conversation_id, sender_id, key, &collection).await
    }

    async fn add_reader(&self, id: MessageId, reader: &ParticipantId) -> ChatResult<bool> {
        let collection = self.db.collection::<Message>(message::COLLECTION);
        message::add_reader(id, reader, &collection).await
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> ChatResult<Vec<Message>> {
        let collection = self.db.collection::<Message>(message::COLLECTION);
        message::list_messages(conversation_id, cursor, limit, &collection).await
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        info!("MongoDB connection closed");
    }
}
