/// Resolver service: answers `/play` with a direct audio URL found by yt-dlp.
use anyhow::Result;
use music_relay::{
    config::ResolverConfig,
    resolver::{routes, DurationPolicy, Resolver, YtDlpExtractor},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "music_relay=info,resolver=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ResolverConfig::load()?;
    tracing::info!("Starting resolver v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("{}", config.summary());

    let extractor = YtDlpExtractor::new(config.ytdlp_path.clone(), config.extraction_timeout);
    if let Err(e) = extractor.verify().await {
        tracing::warn!("yt-dlp check failed, requests will error until it is installed: {}", e);
    }

    let policy = DurationPolicy {
        max_duration: config.max_direct_duration,
        enforce_on_search: config.enforce_limit_on_search,
    };
    let resolver = Arc::new(Resolver::new(Arc::new(extractor), policy));
    let app = routes::router(resolver);

    let addr = config.socket_addr()?;
    tracing::info!("Resolver listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Resolver stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for Ctrl+C: {:?}", e);
        std::future::pending::<()>().await;
    }
}
