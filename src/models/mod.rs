pub mod conversation;
pub mod image;
pub mod message;
pub mod participant;

/// Declares a typed wrapper around a store-assigned `ObjectId`.
macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(mongodb::bson::oid::ObjectId);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, crate::error::ChatError> {
                mongodb::bson::oid::ObjectId::parse_str(raw.trim())
                    .map(Self)
                    .map_err(|_| {
                        crate::error::ChatError::InvalidArgument(format!(
                            "{} is not a valid {} id",
                            raw, $label
                        ))
                    })
            }

            pub fn oid(&self) -> mongodb::bson::oid::ObjectId {
                self.0
            }
        }

        impl From<mongodb::bson::oid::ObjectId> for $name {
            fn from(oid: mongodb::bson::oid::ObjectId) -> Self {
                Self(oid)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.to_hex())
            }
        }
    };
}

pub(crate) use object_id;
