use anyhow::{Context, Result};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::protocol::{PlayRequest, PlayResponse};

const GENERIC_FAILURE: &str = "An error occurred while processing your request.";

#[derive(Debug, Error)]
pub enum ResolverClientError {
    #[error("resolver unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected resolver response: {0}")]
    InvalidResponse(String),

    /// The resolver answered with an error payload.
    #[error("{0}")]
    Rejected(String),
}

impl ResolverClientError {
    /// Text safe to show in Discord. Only resolver rejections are shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ResolverClientError::Rejected(message) => message.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

/// What the resolver hands back for a playable query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub title: String,
    pub thumbnail: String,
    pub audio_url: String,
}

/// HTTP client for the resolver service.
#[derive(Debug, Clone)]
pub struct ResolverClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ResolverClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid resolver URL: {}", base_url))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ResolverClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ResolverClientError::InvalidResponse(format!("bad endpoint {}: {}", path, e)))
    }

    /// Asks the resolver for a streamable URL for `query`.
    pub async fn resolve(
        &self,
        query: &str,
        guild_id: u64,
        user: &str,
    ) -> Result<ResolvedTrack, ResolverClientError> {
        let request = PlayRequest {
            query: query.to_string(),
            guild_id: guild_id.to_string(),
            user: user.to_string(),
        };

        debug!("📡 Resolving '{}' for guild {}", query, guild_id);

        let response = self
            .client
            .post(self.endpoint("play")?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Resolver answered HTTP {}: {}", status, body);
            return Err(ResolverClientError::InvalidResponse(format!("HTTP {}", status)));
        }

        match parse_play_response(&body)? {
            PlayResponse::Success {
                title,
                thumbnail,
                audio_url,
            } => Ok(ResolvedTrack {
                title,
                thumbnail,
                audio_url,
            }),
            PlayResponse::Error { message } => Err(ResolverClientError::Rejected(message)),
        }
    }
}

/// Decodes a `/play` body, rejecting successes without an audio URL.
pub fn parse_play_response(body: &str) -> Result<PlayResponse, ResolverClientError> {
    let parsed: PlayResponse = serde_json::from_str(body)
        .map_err(|e| ResolverClientError::InvalidResponse(e.to_string()))?;

    if let PlayResponse::Success { audio_url, .. } = &parsed {
        if audio_url.is_empty() {
            return Err(ResolverClientError::InvalidResponse(
                "success without audio_url".to_string(),
            ));
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = ResolverClient::new("http://localhost:5000/api", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("play").unwrap().as_str(),
            "http://localhost:5000/api/play"
        );

        let client = ResolverClient::new("http://localhost:5000", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("play").unwrap().as_str(),
            "http://localhost:5000/play"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(ResolverClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn error_payload_parses() {
        let parsed =
            parse_play_response(r#"{"status":"error","message":"The audio is longer than 30 minutes."}"#)
                .unwrap();
        assert_eq!(parsed, PlayResponse::error("The audio is longer than 30 minutes."));
    }

    #[test]
    fn success_without_audio_url_is_invalid() {
        let err = parse_play_response(r#"{"status":"success","title":"t","thumbnail":"","audio_url":""}"#)
            .unwrap_err();
        assert!(matches!(err, ResolverClientError::InvalidResponse(_)));
    }

    #[test]
    fn malformed_body_is_invalid() {
        assert!(matches!(
            parse_play_response("<html>502</html>"),
            Err(ResolverClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn only_rejections_reach_users_verbatim() {
        assert_eq!(
            ResolverClientError::Rejected("Could not find the audio URL.".into()).user_message(),
            "Could not find the audio URL."
        );
        assert_eq!(
            ResolverClientError::InvalidResponse("HTTP 500".into()).user_message(),
            GENERIC_FAILURE
        );
    }
}
