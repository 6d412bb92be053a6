use serenity::model::id::{ChannelId, GuildId};
use std::collections::HashMap;
use tracing::debug;

use super::{
    queue::{GuildQueue, TrackRequest},
    PlaybackError,
};

/// Lifecycle of a guild's playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Playing,
    TornDown,
}

impl SessionState {
    /// Transition table of a session.
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Idle, Playing) | (Playing, Playing) | (Playing, Idle) | (Idle, TornDown) | (Playing, TornDown)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Playing => "playing",
            SessionState::TornDown => "torn down",
        }
    }
}

/// Result of moving a session on to its next track.
#[derive(Debug, PartialEq)]
pub enum Advance {
    /// `track` must be started; end-of-track events carry `generation`.
    Start { track: TrackRequest, generation: u64 },
    /// Nothing left to play. `announce` is set on the Playing -> Idle edge only.
    Drained { announce: bool },
}

/// Queue and voice state of one guild.
#[derive(Debug)]
pub struct GuildSession {
    guild_id: GuildId,
    state: SessionState,
    queue: GuildQueue,
    current: Option<TrackRequest>,
    generation: u64,
    text_channel: ChannelId,
    /// Set when the last started track failed; its failure notice replaces the drain notice.
    quiet_drain: bool,
}

impl GuildSession {
    pub fn new(guild_id: GuildId, text_channel: ChannelId, loop_enabled: bool) -> Self {
        Self {
            guild_id,
            state: SessionState::Idle,
            queue: GuildQueue::with_loop(loop_enabled),
            current: None,
            generation: 0,
            text_channel,
            quiet_drain: false,
        }
    }

    /// Makes the first started track use `floor + 1` as its generation.
    pub fn starting_after(mut self, floor: u64) -> Self {
        self.generation = floor;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
    pub fn queue(&self) -> &GuildQueue {
        &self.queue
    }
    pub fn current(&self) -> Option<&TrackRequest> {
        self.current.as_ref()
    }
    pub fn generation(&self) -> u64 {
        self.generation
    }
    pub fn text_channel(&self) -> ChannelId {
        self.text_channel
    }

    pub fn set_text_channel(&mut self, channel: ChannelId) {
        self.text_channel = channel;
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    pub fn transition(&mut self, to: SessionState) -> Result<(), PlaybackError> {
        if !self.state.can_transition(to) {
            return Err(PlaybackError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        if self.state != to {
            debug!(
                "Guild {} session {} -> {}",
                self.guild_id,
                self.state.as_str(),
                to.as_str()
            );
        }
        self.state = to;
        Ok(())
    }

    pub fn enqueue(&mut self, track: TrackRequest) -> Result<usize, PlaybackError> {
        if self.state == SessionState::TornDown {
            return Err(PlaybackError::InvalidTransition {
                from: self.state,
                to: SessionState::Playing,
            });
        }
        Ok(self.queue.push(track))
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.queue.toggle_loop()
    }

    /// Finishes the current track (if any) and picks the next one.
    pub fn advance(&mut self) -> Result<Advance, PlaybackError> {
        let finished = self.current.take();

        match self.queue.next_track(finished) {
            Some(track) => {
                self.transition(SessionState::Playing)?;
                self.generation += 1;
                self.quiet_drain = false;
                self.current = Some(track.clone());
                Ok(Advance::Start {
                    track,
                    generation: self.generation,
                })
            }
            None => {
                let was_playing = self.is_playing();
                if was_playing {
                    self.transition(SessionState::Idle)?;
                }
                Ok(Advance::Drained {
                    announce: was_playing && !self.quiet_drain,
                })
            }
        }
    }

    /// Drops a track that failed to start without requeueing it.
    pub fn fail_current(&mut self) {
        self.current = None;
        self.quiet_drain = true;
    }

    pub fn tear_down(&mut self) -> Result<(), PlaybackError> {
        self.transition(SessionState::TornDown)?;
        self.queue.clear();
        self.current = None;
        Ok(())
    }
}

/// Live sessions keyed by guild, plus loop flags toggled before a session exists.
///
/// Generations never repeat across sessions: a removed session raises the
/// floor new sessions start from, so an end event from a torn-down session
/// can never match a track of its successor.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<GuildId, GuildSession>,
    pending_loop: HashMap<GuildId, bool>,
    generation_floor: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<&GuildSession> {
        self.sessions.get(&guild_id)
    }

    pub fn get_mut(&mut self, guild_id: GuildId) -> Option<&mut GuildSession> {
        self.sessions.get_mut(&guild_id)
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    /// Opens a session, carrying over a loop flag set while none existed.
    pub fn open(&mut self, guild_id: GuildId, text_channel: ChannelId) -> &mut GuildSession {
        let loop_enabled = self.pending_loop.remove(&guild_id).unwrap_or(false);
        let floor = self.generation_floor;
        self.sessions.entry(guild_id).or_insert_with(|| {
            GuildSession::new(guild_id, text_channel, loop_enabled).starting_after(floor)
        })
    }

    pub fn toggle_loop(&mut self, guild_id: GuildId) -> bool {
        match self.sessions.get_mut(&guild_id) {
            Some(session) => session.toggle_loop(),
            None => {
                let flag = self.pending_loop.entry(guild_id).or_insert(false);
                *flag = !*flag;
                *flag
            }
        }
    }

    /// Tears down and forgets everything known about `guild_id`.
    pub fn remove(&mut self, guild_id: GuildId) -> Option<GuildSession> {
        self.pending_loop.remove(&guild_id);
        let mut session = self.sessions.remove(&guild_id)?;
        self.generation_floor = self.generation_floor.max(session.generation());
        if let Err(e) = session.tear_down() {
            debug!("Teardown of guild {}: {}", guild_id, e);
        }
        Some(session)
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.sessions.keys().copied().collect()
    }
}
