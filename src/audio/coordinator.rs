//! Serial owner of every guild session.
//!
//! [`SessionCoordinator`] is a cheap handle; the state itself lives in a
//! single task that processes one [`Message`] at a time. Commands, the
//! songbird end-of-track hook and the idle reaper all go through the same
//! channel, so a sweep can never tear a session down halfway through an
//! enqueue and a finishing track advances the queue exactly once.
//!
//! The task never waits on Discord messages: notices go through a
//! [`NoticeQueue`]. Joining a voice channel is the one network wait kept on
//! the task, so it is bounded by [`JOIN_TIMEOUT`].

use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{
    player::VoiceGateway,
    queue::TrackRequest,
    reaper::{ReaperPolicy, SweepCandidate},
    session::{Advance, SessionRegistry, SessionState},
    stats::SongStats,
    PlaybackError,
};
use crate::ui::announcer::{Announcer, NoticeQueue};

/// Longest a voice join may hold up the coordinator.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(15);

type Reply<T> = oneshot::Sender<Result<T, PlaybackError>>;

enum Message {
    Enqueue {
        request: EnqueueRequest,
        reply: Reply<EnqueueOutcome>,
    },
    TrackEnded {
        guild_id: GuildId,
        generation: u64,
    },
    Skip {
        guild_id: GuildId,
        reply: Reply<bool>,
    },
    Stop {
        guild_id: GuildId,
        reply: Reply<bool>,
    },
    ToggleLoop {
        guild_id: GuildId,
        reply: Reply<bool>,
    },
    Snapshot {
        guild_id: GuildId,
        reply: Reply<Option<SessionSnapshot>>,
    },
    Sweep {
        policy: ReaperPolicy,
        reply: Reply<Vec<GuildId>>,
    },
}

#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub guild_id: GuildId,
    /// Channel of the requester, joined when the guild has no session yet.
    pub voice_channel: ChannelId,
    /// Where "now playing" and "queue drained" notices go.
    pub text_channel: ChannelId,
    pub track: TrackRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    /// 1-based position the track took in the queue.
    pub position: usize,
    /// Whether this enqueue kicked off playback on an idle session.
    pub started_playback: bool,
}

/// Read-only view of a session used by the `list` command.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub current: Option<TrackRequest>,
    pub queued: Vec<TrackRequest>,
    pub loop_enabled: bool,
}

/// Completion ticket handed to the voice layer when a track starts.
///
/// Calling [`PlaybackDone::notify`] only posts a message; the queue is
/// advanced later on the coordinator task. It holds a weak sender so pending
/// tickets never keep the coordinator alive.
#[derive(Debug, Clone)]
pub struct PlaybackDone {
    tx: mpsc::WeakUnboundedSender<Message>,
    guild_id: GuildId,
    generation: u64,
}

impl PlaybackDone {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn notify(&self) {
        let Some(tx) = self.tx.upgrade() else {
            debug!("Coordinator gone, dropping end of track for guild {}", self.guild_id);
            return;
        };
        let _ = tx.send(Message::TrackEnded {
            guild_id: self.guild_id,
            generation: self.generation,
        });
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Enqueue { request, .. } => write!(f, "Enqueue({})", request.guild_id),
            Message::TrackEnded { guild_id, generation } => {
                write!(f, "TrackEnded({guild_id}, {generation})")
            }
            Message::Skip { guild_id, .. } => write!(f, "Skip({guild_id})"),
            Message::Stop { guild_id, .. } => write!(f, "Stop({guild_id})"),
            Message::ToggleLoop { guild_id, .. } => write!(f, "ToggleLoop({guild_id})"),
            Message::Snapshot { guild_id, .. } => write!(f, "Snapshot({guild_id})"),
            Message::Sweep { .. } => write!(f, "Sweep"),
        }
    }
}

/// Handle to the coordinator task.
#[derive(Clone)]
pub struct SessionCoordinator {
    tx: mpsc::UnboundedSender<Message>,
}

impl SessionCoordinator {
    /// Spawns the coordinator task on the current tokio runtime.
    pub fn spawn(
        voice: Arc<dyn VoiceGateway>,
        announcer: Arc<dyn Announcer>,
        stats: Arc<SongStats>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = CoordinatorTask {
            registry: SessionRegistry::new(),
            voice,
            notices: NoticeQueue::spawn(announcer),
            stats,
            tx: tx.downgrade(),
        };
        tokio::spawn(task.run(rx));
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Message) -> Result<T, PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| PlaybackError::CoordinatorGone)?;
        response.await.map_err(|_| PlaybackError::CoordinatorGone)?
    }

    /// Appends a track, opening the session and starting playback when idle.
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<EnqueueOutcome, PlaybackError> {
        self.request(|reply| Message::Enqueue { request, reply }).await
    }

    /// Stops the current track and moves on. `false` when nothing was playing.
    pub async fn skip(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        self.request(|reply| Message::Skip { guild_id, reply }).await
    }

    /// Disconnects and forgets the guild. `false` when there was no session.
    pub async fn stop(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        self.request(|reply| Message::Stop { guild_id, reply }).await
    }

    /// Flips the loop flag and returns the new value.
    pub async fn toggle_loop(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        self.request(|reply| Message::ToggleLoop { guild_id, reply }).await
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Result<Option<SessionSnapshot>, PlaybackError> {
        self.request(|reply| Message::Snapshot { guild_id, reply }).await
    }

    /// Tears down every session `policy` finds eligible; returns their guilds.
    pub async fn sweep(&self, policy: ReaperPolicy) -> Result<Vec<GuildId>, PlaybackError> {
        self.request(|reply| Message::Sweep { policy, reply }).await
    }
}

struct CoordinatorTask {
    registry: SessionRegistry,
    voice: Arc<dyn VoiceGateway>,
    notices: NoticeQueue,
    stats: Arc<SongStats>,
    tx: mpsc::WeakUnboundedSender<Message>,
}

impl CoordinatorTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        info!("🎛️ Session coordinator started");

        while let Some(message) = rx.recv().await {
            debug!("Coordinator message: {:?}", message);
            match message {
                Message::Enqueue { request, reply } => {
                    let _ = reply.send(self.enqueue(request).await);
                }
                Message::TrackEnded { guild_id, generation } => {
                    self.track_ended(guild_id, generation).await;
                }
                Message::Skip { guild_id, reply } => {
                    let _ = reply.send(self.skip(guild_id).await);
                }
                Message::Stop { guild_id, reply } => {
                    let _ = reply.send(Ok(self.stop(guild_id).await));
                }
                Message::ToggleLoop { guild_id, reply } => {
                    let enabled = self.registry.toggle_loop(guild_id);
                    info!(
                        "🔁 Loop {} for guild {}",
                        if enabled { "enabled" } else { "disabled" },
                        guild_id
                    );
                    let _ = reply.send(Ok(enabled));
                }
                Message::Snapshot { guild_id, reply } => {
                    let _ = reply.send(Ok(self.snapshot(guild_id)));
                }
                Message::Sweep { policy, reply } => {
                    let _ = reply.send(Ok(self.sweep(&policy).await));
                }
            }
        }

        info!("Session coordinator stopped");
    }

    async fn enqueue(&mut self, request: EnqueueRequest) -> Result<EnqueueOutcome, PlaybackError> {
        let guild_id = request.guild_id;

        if !self.registry.contains(guild_id) {
            tokio::time::timeout(JOIN_TIMEOUT, self.voice.connect(guild_id, request.voice_channel))
                .await
                .map_err(|_| PlaybackError::Join(format!("timed out after {:?}", JOIN_TIMEOUT)))??;
            self.registry.open(guild_id, request.text_channel);
            info!("🔊 Session opened for guild {}", guild_id);
        }

        let session = self
            .registry
            .get_mut(guild_id)
            .ok_or(PlaybackError::NotConnected)?;
        session.set_text_channel(request.text_channel);
        let position = session.enqueue(request.track)?;
        let started_playback = !session.is_playing();

        if started_playback {
            self.advance(guild_id).await?;
        }

        Ok(EnqueueOutcome {
            position,
            started_playback,
        })
    }

    /// Moves the guild on to its next track, skipping tracks that fail to start.
    async fn advance(&mut self, guild_id: GuildId) -> Result<(), PlaybackError> {
        loop {
            let Some(session) = self.registry.get_mut(guild_id) else {
                return Ok(());
            };
            let text_channel = session.text_channel();

            match session.advance()? {
                Advance::Drained { announce } => {
                    info!("📭 Queue drained for guild {}", guild_id);
                    if announce {
                        self.notices.queue_drained(text_channel);
                    }
                    return Ok(());
                }
                Advance::Start { track, generation } => {
                    let plays = self.stats.record(track.title());
                    let done = PlaybackDone {
                        tx: self.tx.clone(),
                        guild_id,
                        generation,
                    };

                    match self.voice.play(guild_id, &track, done).await {
                        Ok(()) => {
                            info!(
                                "🎵 Playing {} in guild {} (play #{})",
                                track.title(),
                                guild_id,
                                plays
                            );
                            self.notices.now_playing(text_channel, track);
                            return Ok(());
                        }
                        Err(e) => {
                            warn!("❌ Could not play {} in guild {}: {}", track.title(), guild_id, e);
                            if let Some(session) = self.registry.get_mut(guild_id) {
                                session.fail_current();
                            }
                            self.notices.playback_failed(text_channel, track, e.to_string());
                        }
                    }
                }
            }
        }
    }

    async fn track_ended(&mut self, guild_id: GuildId, generation: u64) {
        let current = self
            .registry
            .get(guild_id)
            .filter(|session| session.is_playing())
            .map(|session| session.generation());

        if current != Some(generation) {
            debug!(
                "Ignoring stale end of track for guild {} (generation {})",
                guild_id, generation
            );
            return;
        }

        if let Err(e) = self.advance(guild_id).await {
            error!("Error advancing queue for guild {}: {}", guild_id, e);
        }
    }

    async fn skip(&mut self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        let playing = self
            .registry
            .get(guild_id)
            .is_some_and(|session| session.is_playing());
        if !playing {
            return Ok(false);
        }

        if let Err(e) = self.voice.stop(guild_id).await {
            warn!("Error stopping track in guild {}: {}", guild_id, e);
        }
        info!("⏭️ Skipping track in guild {}", guild_id);
        self.advance(guild_id).await?;
        Ok(true)
    }

    async fn stop(&mut self, guild_id: GuildId) -> bool {
        if self.registry.remove(guild_id).is_none() {
            return false;
        }
        self.disconnect(guild_id).await;
        info!("⏹️ Playback stopped in guild {}", guild_id);
        true
    }

    async fn disconnect(&self, guild_id: GuildId) {
        if let Err(e) = self.voice.stop(guild_id).await {
            warn!("Error stopping track in guild {}: {}", guild_id, e);
        }
        if let Err(e) = self.voice.disconnect(guild_id).await {
            warn!("Error leaving voice in guild {}: {}", guild_id, e);
        }
    }

    fn snapshot(&self, guild_id: GuildId) -> Option<SessionSnapshot> {
        self.registry.get(guild_id).map(|session| SessionSnapshot {
            state: session.state(),
            current: session.current().cloned(),
            queued: session.queue().tracks().cloned().collect(),
            loop_enabled: session.queue().is_loop(),
        })
    }

    async fn sweep(&mut self, policy: &ReaperPolicy) -> Vec<GuildId> {
        let mut reaped = Vec::new();

        for guild_id in self.registry.guild_ids() {
            let Some(session) = self.registry.get(guild_id) else {
                continue;
            };
            let state = session.state();
            let queue_len = session.queue().len();
            let human_listeners = self.voice.human_listeners(guild_id).await.unwrap_or(0);

            let candidate = SweepCandidate {
                guild_id,
                state,
                queue_len,
                human_listeners,
            };
            if !policy.is_eligible(&candidate) {
                continue;
            }

            self.registry.remove(guild_id);
            self.disconnect(guild_id).await;
            info!(
                "👋 Disconnected due to empty voice channel or queue (guild {})",
                guild_id
            );
            reaped.push(guild_id);
        }

        reaped
    }
}
