// Main Entry Point untuk Obrolan Messenger Client
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod backend;
mod config;
mod domain;
mod error;
mod pages;
mod session_store;
mod terminal;
mod view;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize structured logging (stderr, stdout dipakai untuk UI)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "messenger_client=info,shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("💬 Starting Obrolan - Messenger Client");
    tracing::info!("🔧 Direct & group chat dengan realtime update");

    let config = config::AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    tracing::info!("🌍 Environment: {}", config.environment);
    if config.is_production() {
        tracing::info!("🔒 Running in PRODUCTION mode");
    } else {
        tracing::info!("🔧 Running in DEVELOPMENT mode");
    }

    tracing::info!("🔌 Initializing client context...");
    let ctx = config::ClientContext::new(config)?;
    tracing::info!("✅ Client context initialized ({})", ctx.config.backend_url);

    terminal::run(ctx).await?;

    tracing::info!("👋 Messenger client stopped");
    Ok(())
}
