//! # Bot Module
//!
//! Discord front-end: slash command registration, interaction dispatch and
//! the wiring between serenity, songbird and the session coordinator.
//!
//! The coordinator needs the gateway cache and HTTP client, so it is created
//! on the first `ready` event together with the idle reaper and the stats
//! reset task. Later `ready` events (reconnects) reuse it.

use anyhow::{Context as _, Result};
use serenity::{
    all::{ActivityData, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use songbird::Songbird;
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{
        coordinator::SessionCoordinator,
        player::SongbirdPlayer,
        reaper::{self, ReaperPolicy},
        stats::{self, SongStats},
    },
    config::BotConfig,
    sources::ResolverClient,
    ui::announcer::ChannelAnnouncer,
};

pub struct MusicBot {
    config: Arc<BotConfig>,
    resolver: ResolverClient,
    songbird: Arc<Songbird>,
    stats: Arc<SongStats>,
    coordinator: OnceLock<SessionCoordinator>,
}

impl MusicBot {
    pub fn new(config: BotConfig, songbird: Arc<Songbird>) -> Result<Self> {
        let resolver = ResolverClient::new(&config.resolver_url, config.resolver_timeout)?;

        Ok(Self {
            config: Arc::new(config),
            resolver,
            songbird,
            stats: Arc::new(SongStats::new()),
            coordinator: OnceLock::new(),
        })
    }

    pub fn resolver(&self) -> &ResolverClient {
        &self.resolver
    }

    pub fn stats(&self) -> &SongStats {
        &self.stats
    }

    pub fn coordinator(&self) -> Result<&SessionCoordinator> {
        self.coordinator
            .get()
            .context("The bot is still starting up, try again in a moment.")
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registering commands for guild {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
            }
            None => {
                info!("🌐 Registering global commands");
                commands::register_global_commands(ctx).await?;
            }
        }

        info!("✅ Slash commands registered");
        Ok(())
    }

    fn start_services(&self, ctx: &Context) -> Result<()> {
        if self.coordinator.get().is_some() {
            return Ok(());
        }

        let player = SongbirdPlayer::new(self.songbird.clone(), ctx.cache.clone())?;
        let announcer = ChannelAnnouncer::new(ctx.http.clone());
        let coordinator =
            SessionCoordinator::spawn(Arc::new(player), Arc::new(announcer), self.stats.clone());

        if self.coordinator.set(coordinator.clone()).is_err() {
            return Ok(());
        }

        reaper::spawn(coordinator, ReaperPolicy::new(self.config.reaper_interval));
        stats::spawn_reset_task(self.stats.clone(), self.config.stats_reset_interval);

        info!(
            "⚙️ Session coordinator started (reaper every {}, stats reset every {})",
            humantime::format_duration(self.config.reaper_interval),
            humantime::format_duration(self.config.stats_reset_interval)
        );
        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.start_services(&ctx) {
            error!("Failed to start playback services: {:?}", e);
        }

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Failed to register commands: {:?}", e);
        }

        ctx.set_activity(Some(ActivityData::listening("Music")));
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Forgets the session when the bot is removed from voice by someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }

        let was_connected = old.and_then(|state| state.channel_id).is_some();
        if !was_connected || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("🔌 Disconnected from voice in guild {}", guild_id);
        match self.coordinator() {
            Ok(coordinator) => {
                if let Err(e) = coordinator.stop(guild_id).await {
                    warn!("Could not clean up session for guild {}: {}", guild_id, e);
                }
            }
            Err(e) => warn!("{}", e),
        }
    }
}
