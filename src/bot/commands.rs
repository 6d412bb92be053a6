use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::{Command, CommandOptionType},
        id::GuildId,
    },
    prelude::Context,
};

/// Every slash command the bot answers.
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        loop_command(),
        list_command(),
        top_command(),
        skip_command(),
        stop_command(),
    ]
}

/// Registers commands globally; Discord may take a while to propagate them.
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    Command::set_global_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

/// Registers commands for a single guild; they show up immediately.
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Plays music from a YouTube URL or search query.")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL or search terms",
            )
            .required(true),
        )
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Loops the current song.")
}

fn list_command() -> CreateCommand {
    CreateCommand::new("list").description("View the queue.")
}

fn top_command() -> CreateCommand {
    CreateCommand::new("top").description("View the top 5 most played songs.")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skips the current song.")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stops playback and leaves the voice channel.")
}
