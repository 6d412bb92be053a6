//! JSON bodies exchanged between the bot and the resolver service.

use serde::{Deserialize, Serialize};

/// Body of `POST /play`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    pub query: String,
    pub guild_id: String,
    pub user: String,
}

/// Answer of `POST /play`, tagged by its `status` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PlayResponse {
    Success {
        title: String,
        thumbnail: String,
        audio_url: String,
    },
    Error {
        message: String,
    },
}

impl PlayResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// One mirrored queue entry, serialized as `[audio_url, title, thumbnail, user]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry(pub String, pub String, pub String, pub String);

/// Body of `GET /queue/{guild_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueResponse {
    pub queue: Vec<QueueEntry>,
}
