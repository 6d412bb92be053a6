//! The resolver service: turns a play query into a directly streamable
//! audio URL plus display metadata, and keeps a per-guild log of what it
//! resolved.

pub mod error;
pub mod extractor;
pub mod routes;

use dashmap::DashMap;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

pub use error::ResolveError;
pub use extractor::{MediaExtractor, MediaInfo, YtDlpExtractor};

use crate::protocol::{PlayRequest, QueueEntry};

const UNTITLED: &str = "No Title";

/// How a raw query is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query<'a> {
    /// An absolute http(s) URL, extracted as is.
    Direct(&'a str),
    /// Anything else, answered with the first search hit.
    Search(&'a str),
}

impl<'a> Query<'a> {
    /// Queries starting with `http` that parse as URLs are direct; everything
    /// else, malformed URLs included, is a search term.
    pub fn classify(raw: &'a str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http") {
            if let Ok(url) = url::Url::parse(raw) {
                if matches!(url.scheme(), "http" | "https") {
                    return Query::Direct(raw);
                }
            }
        }
        Query::Search(raw)
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Query::Direct(_))
    }
}

/// Maximum media length and which query kinds it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPolicy {
    pub max_duration: Duration,
    pub enforce_on_search: bool,
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(30 * 60),
            enforce_on_search: false,
        }
    }
}

impl DurationPolicy {
    fn applies_to(&self, query: &Query<'_>) -> bool {
        query.is_direct() || self.enforce_on_search
    }

    /// Unknown durations count as zero.
    fn check(&self, info: &MediaInfo) -> Result<(), ResolveError> {
        let seconds = info
            .duration
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .unwrap_or(0.0);

        if seconds > self.max_duration.as_secs_f64() {
            return Err(ResolveError::TooLong {
                duration: Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX),
                limit: self.max_duration,
            });
        }
        Ok(())
    }
}

/// A successfully resolved query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMedia {
    pub title: String,
    pub thumbnail: String,
    pub audio_url: String,
    pub uploader: Option<String>,
    pub duration: Option<Duration>,
}

pub struct Resolver {
    extractor: Arc<dyn MediaExtractor>,
    policy: DurationPolicy,
    mirror: DashMap<String, Vec<QueueEntry>>,
}

impl Resolver {
    pub fn new(extractor: Arc<dyn MediaExtractor>, policy: DurationPolicy) -> Self {
        Self {
            extractor,
            policy,
            mirror: DashMap::new(),
        }
    }

    /// Looks up `raw` and applies the duration policy.
    pub async fn resolve(&self, raw: &str) -> Result<ResolvedMedia, ResolveError> {
        let query = Query::classify(raw);

        let info = match query {
            Query::Direct("") | Query::Search("") => return Err(ResolveError::EmptyQuery),
            Query::Direct(url) => {
                debug!("🔗 Direct URL: {}", url);
                self.extractor.extract(url).await?
            }
            Query::Search(term) => {
                debug!("🔍 Search: {}", term);
                self.extractor.search_first(term).await?
            }
        };

        if self.policy.applies_to(&query) {
            self.policy.check(&info)?;
        }

        let audio_url = info
            .url
            .filter(|url| !url.is_empty())
            .ok_or(ResolveError::NoAudioUrl)?;

        Ok(ResolvedMedia {
            title: info.title.unwrap_or_else(|| UNTITLED.to_string()),
            thumbnail: info.thumbnail.unwrap_or_default(),
            audio_url,
            uploader: info.uploader,
            duration: info
                .duration
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
        })
    }

    /// Resolves a play request and records it in the guild's mirror.
    pub async fn play(&self, request: &PlayRequest) -> Result<ResolvedMedia, ResolveError> {
        let media = self.resolve(&request.query).await?;

        self.mirror
            .entry(request.guild_id.clone())
            .or_default()
            .push(QueueEntry(
                media.audio_url.clone(),
                media.title.clone(),
                media.thumbnail.clone(),
                request.user.clone(),
            ));

        info!(
            "🎵 Resolved '{}' for guild {} ({})",
            media.title, request.guild_id, request.user
        );
        Ok(media)
    }

    /// Everything resolved for a guild so far, oldest first.
    pub fn queue(&self, guild_id: &str) -> Vec<QueueEntry> {
        self.mirror
            .get(guild_id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}
