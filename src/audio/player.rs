use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId},
};
use songbird::{
    input::{HttpRequest, Input},
    tracks::TrackHandle,
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{coordinator::PlaybackDone, queue::TrackRequest, PlaybackError};

/// Playback volume applied to every track.
const DEFAULT_VOLUME: f32 = 0.8;

/// Voice transport used by the session coordinator.
///
/// Implementations only move audio; they never touch queue state. When a
/// started track ends they call [`PlaybackDone::notify`] and let the
/// coordinator decide what happens next.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Joins `channel_id`, moving there if already connected in the guild.
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlaybackError>;

    /// Replaces whatever is playing with `track`.
    async fn play(
        &self,
        guild_id: GuildId,
        track: &TrackRequest,
        done: PlaybackDone,
    ) -> Result<(), PlaybackError>;

    /// Stops the current track, if any.
    async fn stop(&self, guild_id: GuildId) -> Result<(), PlaybackError>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), PlaybackError>;

    /// Non-bot members in the joined channel, `None` when unknown.
    async fn human_listeners(&self, guild_id: GuildId) -> Option<usize>;
}

/// [`VoiceGateway`] backed by songbird calls and the serenity cache.
pub struct SongbirdPlayer {
    manager: Arc<Songbird>,
    cache: Arc<Cache>,
    http_client: reqwest::Client,
    current_tracks: DashMap<GuildId, TrackHandle>,
}

impl SongbirdPlayer {
    pub fn new(manager: Arc<Songbird>, cache: Arc<Cache>) -> Result<Self, PlaybackError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlaybackError::Playback(e.to_string()))?;

        Ok(Self {
            manager,
            cache,
            http_client,
            current_tracks: DashMap::new(),
        })
    }
}

#[async_trait]
impl VoiceGateway for SongbirdPlayer {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), PlaybackError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| PlaybackError::Join(e.to_string()))?;

        let mut call = call.lock().await;
        if !call.is_deaf() {
            if let Err(e) = call.deafen(true).await {
                warn!("Deafen failed in guild {}: {:?}", guild_id, e);
            }
        }

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(())
    }

    async fn play(
        &self,
        guild_id: GuildId,
        track: &TrackRequest,
        done: PlaybackDone,
    ) -> Result<(), PlaybackError> {
        let call = self.manager.get(guild_id).ok_or(PlaybackError::NotConnected)?;

        let input = Input::from(HttpRequest::new(
            self.http_client.clone(),
            track.source_url().to_string(),
        ));

        let mut call = call.lock().await;
        call.stop();
        let handle = call.play_input(input);
        if let Err(e) = handle.set_volume(DEFAULT_VOLUME) {
            warn!("Could not set volume in guild {}: {:?}", guild_id, e);
        }

        // A track that errors out never reaches End, so listen for both.
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), TrackEndNotifier { done: done.clone() })
                .map_err(|e| PlaybackError::Playback(e.to_string()))?;
        }

        self.current_tracks.insert(guild_id, handle);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        if let Some((_, handle)) = self.current_tracks.remove(&guild_id) {
            handle
                .stop()
                .map_err(|e| PlaybackError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        self.current_tracks.remove(&guild_id);

        if self.manager.get(guild_id).is_none() {
            debug!("No voice call to leave in guild {}", guild_id);
            return Ok(());
        }

        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| PlaybackError::Join(e.to_string()))?;
        info!("👋 Left voice channel in guild {}", guild_id);
        Ok(())
    }

    async fn human_listeners(&self, guild_id: GuildId) -> Option<usize> {
        let call = self.manager.get(guild_id)?;
        let channel = call.lock().await.current_channel()?;
        let channel_id = ChannelId::from(channel.0);

        let bot_id = self.cache.current_user().id;
        let guild = self.cache.guild(guild_id)?;

        let listeners = guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel_id))
            .filter(|state| state.user_id != bot_id)
            .filter(|state| !state.member.as_ref().is_some_and(|member| member.user.bot))
            .count();
        Some(listeners)
    }
}

/// Forwards songbird's end-of-track event to the coordinator.
struct TrackEndNotifier {
    done: PlaybackDone,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                debug!(
                    "Track ended in guild {} with {:?}",
                    self.done.guild_id(),
                    state.playing
                );
            }
        }

        self.done.notify();
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// In-memory [`VoiceGateway`] recording what the coordinator asked for.
    #[derive(Default)]
    pub(crate) struct FakeVoice {
        connects: Mutex<Vec<GuildId>>,
        disconnects: Mutex<Vec<GuildId>>,
        played: Mutex<Vec<(GuildId, String, PlaybackDone)>>,
        stops: Mutex<usize>,
        listeners: Mutex<Option<usize>>,
        failing_title: Mutex<Option<String>>,
        connect_fails: Mutex<bool>,
        connect_stalls: Mutex<bool>,
    }

    impl FakeVoice {
        pub(crate) fn fail_on(&self, title: &str) {
            *self.failing_title.lock() = Some(title.to_string());
        }

        pub(crate) fn fail_connect(&self) {
            *self.connect_fails.lock() = true;
        }

        /// Makes every later join hang until the caller gives up.
        pub(crate) fn stall_connect(&self) {
            *self.connect_stalls.lock() = true;
        }

        pub(crate) fn set_listeners(&self, listeners: Option<usize>) {
            *self.listeners.lock() = listeners;
        }

        pub(crate) fn connects(&self) -> Vec<GuildId> {
            self.connects.lock().clone()
        }

        pub(crate) fn disconnects(&self) -> Vec<GuildId> {
            self.disconnects.lock().clone()
        }

        pub(crate) fn stops(&self) -> usize {
            *self.stops.lock()
        }

        pub(crate) fn played_titles(&self, guild_id: GuildId) -> Vec<String> {
            self.played
                .lock()
                .iter()
                .filter(|(guild, _, _)| *guild == guild_id)
                .map(|(_, title, _)| title.clone())
                .collect()
        }

        pub(crate) fn last_done(&self, guild_id: GuildId) -> Option<PlaybackDone> {
            self.played
                .lock()
                .iter()
                .rev()
                .find(|(guild, _, _)| *guild == guild_id)
                .map(|(_, _, done)| done.clone())
        }
    }

    #[async_trait]
    impl VoiceGateway for FakeVoice {
        async fn connect(&self, guild_id: GuildId, _channel_id: ChannelId) -> Result<(), PlaybackError> {
            if *self.connect_fails.lock() {
                return Err(PlaybackError::Join("missing permissions".into()));
            }
            let stalls = *self.connect_stalls.lock();
            if stalls {
                std::future::pending::<()>().await;
            }
            self.connects.lock().push(guild_id);
            Ok(())
        }

        async fn play(
            &self,
            guild_id: GuildId,
            track: &TrackRequest,
            done: PlaybackDone,
        ) -> Result<(), PlaybackError> {
            if self.failing_title.lock().as_deref() == Some(track.title()) {
                return Err(PlaybackError::Playback("decoder refused stream".into()));
            }
            self.played
                .lock()
                .push((guild_id, track.title().to_string(), done));
            Ok(())
        }

        async fn stop(&self, _guild_id: GuildId) -> Result<(), PlaybackError> {
            *self.stops.lock() += 1;
            Ok(())
        }

        async fn disconnect(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
            self.disconnects.lock().push(guild_id);
            Ok(())
        }

        async fn human_listeners(&self, _guild_id: GuildId) -> Option<usize> {
            *self.listeners.lock()
        }
    }
}
