use serde::{Deserialize, Serialize};

super::object_id!(
    /// Id of a document in the `images` collection.
    ImageId,
    "image"
);

/// Metadata for an image uploaded to the external blob store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(rename = "_id")]
    pub id: ImageId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl NewImage {
    pub fn into_image(self, id: ImageId) -> Image {
        Image {
            id,
            url: self.url,
            file_id: self.file_id,
        }
    }
}
