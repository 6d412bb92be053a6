use anyhow::{Context as _, Result};
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{
        coordinator::{EnqueueRequest, SessionSnapshot},
        queue::TrackRequest,
        PlaybackError,
    },
    bot::MusicBot,
    ui::embeds,
};

/// Dispatches a slash command by name.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(ctx, &command, "❌ This command only works in a server.").await;
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await,
        "list" => handle_list(ctx, &command, bot, guild_id).await,
        "top" => handle_top(ctx, &command, bot).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        _ => respond(ctx, &command, "❌ Unknown command").await,
    }
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .context("Missing query option")?;

    // Resolving can take longer than the 3 second interaction window
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let Some(voice_channel) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return edit_content(ctx, command, format!("❌ {}", PlaybackError::NotInVoiceChannel)).await;
    };

    let resolved = match bot
        .resolver()
        .resolve(query, guild_id.get(), &command.user.name)
        .await
    {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!("Could not resolve '{}' for guild {}: {}", query, guild_id, e);
            return edit_content(ctx, command, format!("❌ {}", e.user_message())).await;
        }
    };

    let track = TrackRequest::new(
        resolved.audio_url,
        resolved.title,
        resolved.thumbnail,
        command.user.name.clone(),
    );

    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_track_added_embed(&track)),
        )
        .await?;

    let request = EnqueueRequest {
        guild_id,
        voice_channel,
        text_channel: command.channel_id,
        track,
    };

    if let Err(e) = bot.coordinator()?.enqueue(request).await {
        warn!("Enqueue failed in guild {}: {}", guild_id, e);
        command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new().embed(embeds::create_error_embed(&e.to_string())),
            )
            .await?;
    }

    Ok(())
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let enabled = bot.coordinator()?.toggle_loop(guild_id).await?;
    respond(ctx, command, loop_message(enabled)).await
}

async fn handle_list(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let snapshot = bot.coordinator()?.snapshot(guild_id).await?;
    respond(ctx, command, queue_message(snapshot.as_ref())).await
}

async fn handle_top(ctx: &Context, command: &CommandInteraction, bot: &MusicBot) -> Result<()> {
    let entries = bot.stats().top(embeds::TOP_LIMIT);
    if entries.is_empty() {
        return respond(ctx, command, "No song data in the current statistics.").await;
    }

    let embed = embeds::create_top_embed(&entries, chrono::Local::now());
    respond_embed(ctx, command, embed).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let message = if bot.coordinator()?.skip(guild_id).await? {
        "⏭ Skipping the song."
    } else {
        "There is no song playing."
    };
    respond(ctx, command, message).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let message = if bot.coordinator()?.stop(guild_id).await? {
        "⏹ Stopped playback and left the voice channel."
    } else {
        "Not connected to a voice channel."
    };
    respond(ctx, command, message).await
}

fn loop_message(enabled: bool) -> String {
    let status = if enabled { "Enabled" } else { "Disabled" };
    format!("🔁 Loop playback is **{}**.", status)
}

/// Lists queued tracks only; the one playing is not part of the queue.
fn queue_message(snapshot: Option<&SessionSnapshot>) -> String {
    match snapshot {
        Some(snapshot) if !snapshot.queued.is_empty() => {
            format!("🎶 Queue:\n{}", embeds::format_queue_listing(&snapshot.queued))
        }
        _ => "The queue is empty.".to_string(),
    }
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: impl Into<String>) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(content)),
        )
        .await?;
    Ok(())
}

async fn respond_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

async fn edit_content(ctx: &Context, command: &CommandInteraction, content: String) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}
