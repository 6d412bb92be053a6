use anyhow::{Context, Result};
use music_relay::{bot::MusicBot, config::BotConfig};
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("music_relay=info".parse()?)
                .add_directive("serenity=warn".parse()?)
                .add_directive("songbird=warn".parse()?),
        )
        .init();

    info!("🎵 Starting music-relay bot v{}", env!("CARGO_PKG_VERSION"));

    let config = BotConfig::load()?;
    info!("{}", config.summary());

    // Voice state updates tell us which channel each member is in
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let token = config.discord_token.clone();
    let handler = MusicBot::new(config, songbird.clone())?;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await
        .context("Failed to build Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⚠️ Shutdown signal received, closing shards...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Could not listen for Ctrl+C: {:?}", e),
        }
    });

    info!("🚀 Connecting to Discord");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
