/// Resolver HTTP routes
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{error::ResolveError, Resolver};
use crate::protocol::{PlayRequest, PlayResponse, QueueResponse};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub fn router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/play", post(play))
        .route("/queue/:guild_id", get(queue))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(resolver)
}

/// POST /play - Resolve a query into a streamable audio URL
async fn play(
    State(resolver): State<Arc<Resolver>>,
    Json(request): Json<PlayRequest>,
) -> Result<Json<PlayResponse>, ResolveError> {
    tracing::debug!(
        "Play request from {} in guild {}: {}",
        request.user,
        request.guild_id,
        request.query
    );

    let media = resolver.play(&request).await?;

    Ok(Json(PlayResponse::Success {
        title: media.title,
        thumbnail: media.thumbnail,
        audio_url: media.audio_url,
    }))
}

/// GET /queue/:guild_id - Everything resolved for a guild
async fn queue(
    State(resolver): State<Arc<Resolver>>,
    Path(guild_id): Path<String>,
) -> Json<QueueResponse> {
    Json(QueueResponse {
        queue: resolver.queue(&guild_id),
    })
}

/// GET /health - Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
