//! # Audio Module
//!
//! Per-guild playback for the bot.
//!
//! ## Architecture
//!
//! ### [`coordinator`] - Session Coordinator
//! - Owns every guild session and serializes all mutations on one task
//! - Receives end-of-track notifications as messages, never as direct calls
//!
//! ### [`session`] / [`queue`] - Session State
//! - Explicit `Idle | Playing | TornDown` state machine per guild
//! - FIFO queue with a "requeue-after-play" loop flag
//!
//! ### [`player`] - Voice Transport
//! - Songbird-backed [`player::VoiceGateway`] implementation
//!
//! ### [`reaper`] / [`stats`] - Background Tasks
//! - Periodic sweep of idle sessions
//! - Play counts with a periodic hard reset
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use music_relay::audio::{coordinator::{EnqueueRequest, SessionCoordinator}, queue::TrackRequest};
//! use serenity::all::{ChannelId, GuildId};
//!
//! # async fn example(coordinator: SessionCoordinator) -> anyhow::Result<()> {
//! let track = TrackRequest::new("https://cdn.example/a.webm", "Song", "", "someone");
//! coordinator
//!     .enqueue(EnqueueRequest {
//!         guild_id: GuildId::new(1),
//!         voice_channel: ChannelId::new(2),
//!         text_channel: ChannelId::new(3),
//!         track,
//!     })
//!     .await?;
//! coordinator.skip(GuildId::new(1)).await?;
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod coordinator;
pub mod player;
pub mod queue;
pub mod reaper;
pub mod session;
pub mod stats;

use session::SessionState;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Join a voice channel first.")]
    NotInVoiceChannel,

    #[error("Could not join the voice channel: {0}")]
    Join(String),

    #[error("Not connected to a voice channel.")]
    NotConnected,

    #[error("Could not start playback: {0}")]
    Playback(String),

    #[error("Invalid session transition from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("Playback service is not running.")]
    CoordinatorGone,
}
