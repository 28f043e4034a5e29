use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant ids are UUID-shaped strings.
pub const PARTICIPANT_ID_LEN: usize = 36;

/// Opaque id of a conversation member, trimmed and exactly 36 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Trims surrounding whitespace and checks the length. Returns `None` for
    /// anything that is not exactly 36 characters.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.chars().count() == PARTICIPANT_ID_LEN {
            Some(Self(trimmed.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
