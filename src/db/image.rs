use crate::error::{ChatError, ChatResult};
use crate::models::image::{Image, ImageId, NewImage};
use mongodb::bson::doc;
use mongodb::Collection;

pub const COLLECTION: &str = "images";

pub async fn save_image(image: &NewImage, collection: &Collection<NewImage>) -> ChatResult<ImageId> {
    let result = collection.insert_one(image, None).await?;
    result
        .inserted_id
        .as_object_id()
        .map(ImageId::from)
        .ok_or_else(|| ChatError::Store("image insert returned a non-ObjectId _id".into()))
}

pub async fn find_image(id: ImageId, collection: &Collection<Image>) -> ChatResult<Option<Image>> {
    Ok(collection.find_one(doc! { "_id": id.oid() }, None).await?)
}
