use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use hahadog::api::AppState;
use hahadog::core::config::AppConfig;
use hahadog::emoji::backend::HuggingFaceBackend;
use hahadog::emoji::client::EmojiClient;
use hahadog::emoji::keep_alive;
use hahadog::line::LineClient;
use hahadog::storage::Analytics;

#[derive(Parser, Debug)]
#[command(name = "hahadog", about = "LINE emoji-annotation bot")]
struct Args {
    /// Port for the webhook listener.
    #[arg(short, long, default_value_t = 8000, env = "PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    hahadog::setup_logging();

    let args = Args::parse();
    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("Config error: {e}"))?;

    let backend = HuggingFaceBackend::new(config.emoji_api_url.clone())?;
    let emoji = Arc::new(EmojiClient::new(
        Arc::new(backend),
        config.emoji_api_tokens.clone(),
        config.workers,
        config.sentence_limit,
    ));

    let analytics = match &config.database_url {
        Some(url) => Some(Analytics::connect(url).await?),
        None => {
            info!("DATABASE_URL not set; analytics disabled");
            None
        }
    };

    let line = LineClient::new(config.channel_access_token.clone())?;

    tokio::spawn(keep_alive::run(
        Arc::clone(&emoji),
        Duration::from_secs(config.keep_alive_interval_secs),
    ));

    let state = Arc::new(AppState { config, emoji, line, analytics });
    let app = hahadog::api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server started at port {}", args.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Server stopped.");
}
