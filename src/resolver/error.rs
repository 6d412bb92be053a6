use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::PlayResponse;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("The query is empty.")]
    EmptyQuery,

    #[error("{0}")]
    Extraction(String),

    #[error("No results found for \"{0}\".")]
    NoResults(String),

    #[error("Could not find the audio URL.")]
    NoAudioUrl,

    #[error("The audio is longer than {} minutes.", .limit.as_secs() / 60)]
    TooLong { duration: Duration, limit: Duration },

    #[error("Extraction timed out after {0:?}.")]
    Timeout(Duration),

    #[error("Could not read extractor output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
}

/// Failures still answer 200 with an error payload; the bot reads the body.
impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        match &self {
            ResolveError::Extraction(msg) => tracing::warn!("Extraction failed: {}", msg),
            ResolveError::Timeout(limit) => tracing::warn!("Extraction timed out after {:?}", limit),
            ResolveError::InvalidOutput(e) => tracing::error!("Unreadable extractor output: {:?}", e),
            other => tracing::info!("Rejected request: {}", other),
        }

        (StatusCode::OK, Json(PlayResponse::error(self.to_string()))).into_response()
    }
}
