use async_trait::async_trait;
use serenity::{builder::CreateMessage, http::Http, model::id::ChannelId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::embeds;
use crate::audio::queue::TrackRequest;

/// Notices the coordinator posts into a guild's text channel.
///
/// Delivery failures are logged by the implementation. The coordinator only
/// talks to an announcer through a [`NoticeQueue`], so playback never waits
/// on a notice being accepted.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn now_playing(&self, channel_id: ChannelId, track: &TrackRequest);

    async fn queue_drained(&self, channel_id: ChannelId);

    async fn playback_failed(&self, channel_id: ChannelId, track: &TrackRequest, reason: &str);
}

enum Notice {
    NowPlaying(ChannelId, TrackRequest),
    QueueDrained(ChannelId),
    PlaybackFailed(ChannelId, TrackRequest, String),
}

/// Fire-and-forget front of an [`Announcer`].
///
/// Notices are delivered in order by a dedicated task; a slow or rate limited
/// channel delays later notices but never the caller.
#[derive(Clone)]
pub struct NoticeQueue {
    tx: mpsc::UnboundedSender<Notice>,
}

impl NoticeQueue {
    /// Spawns the delivery task; it ends once every queue handle is dropped.
    pub fn spawn(announcer: Arc<dyn Announcer>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(notice) = rx.recv().await {
                match notice {
                    Notice::NowPlaying(channel_id, track) => {
                        announcer.now_playing(channel_id, &track).await
                    }
                    Notice::QueueDrained(channel_id) => announcer.queue_drained(channel_id).await,
                    Notice::PlaybackFailed(channel_id, track, reason) => {
                        announcer.playback_failed(channel_id, &track, &reason).await
                    }
                }
            }
            debug!("Notice queue closed");
        });

        Self { tx }
    }

    pub fn now_playing(&self, channel_id: ChannelId, track: TrackRequest) {
        self.push(Notice::NowPlaying(channel_id, track));
    }

    pub fn queue_drained(&self, channel_id: ChannelId) {
        self.push(Notice::QueueDrained(channel_id));
    }

    pub fn playback_failed(&self, channel_id: ChannelId, track: TrackRequest, reason: String) {
        self.push(Notice::PlaybackFailed(channel_id, track, reason));
    }

    fn push(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            warn!("Notice dropped, delivery task is gone");
        }
    }
}

/// [`Announcer`] that posts through the Discord HTTP API.
pub struct ChannelAnnouncer {
    http: Arc<Http>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn send(&self, channel_id: ChannelId, message: CreateMessage) {
        if let Err(why) = channel_id.send_message(&self.http, message).await {
            warn!("Error sending message to channel {}: {:?}", channel_id, why);
        }
    }
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn now_playing(&self, channel_id: ChannelId, track: &TrackRequest) {
        let embed = embeds::create_now_playing_embed(track);
        self.send(channel_id, CreateMessage::new().embed(embed)).await;
    }

    async fn queue_drained(&self, channel_id: ChannelId) {
        self.send(channel_id, CreateMessage::new().content("No more songs in the queue."))
            .await;
    }

    async fn playback_failed(&self, channel_id: ChannelId, track: &TrackRequest, reason: &str) {
        let embed = embeds::create_error_embed(&format!(
            "Could not play **{}**: {}",
            track.title(),
            reason
        ));
        self.send(channel_id, CreateMessage::new().embed(embed)).await;
    }
}
