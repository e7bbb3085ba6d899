//! 哈哈狗 - a LINE chatbot that decorates messages with emojis using EmojiLM.
//!
//! The bot receives signed webhook batches from the LINE platform, strips the
//! `@哈哈狗` mention marker, splits the message into sentences, queries a
//! serverless text-generation endpoint once per sentence for a representative
//! emoji, and replies with the original text interleaved with the emojis.
//!
//! # Architecture
//!
//! The system uses:
//! - Axum for the webhook HTTP endpoint
//! - reqwest for the generation backend and the LINE reply API
//! - An LRU cache plus a semaphore-gated worker pool around generation
//! - A background keep-alive pinger so the serverless model stays warm
//! - Optional SQLite analytics via sqlx (usage counters and feedback rows)
//! - Tokio for the async runtime
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hahadog::core::config::AppConfig;
//! use hahadog::emoji::backend::HuggingFaceBackend;
//! use hahadog::emoji::client::EmojiClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     hahadog::setup_logging();
//!
//!     let config = AppConfig::from_env()?;
//!     let backend = HuggingFaceBackend::new(config.emoji_api_url.clone())?;
//!     let client = EmojiClient::new(
//!         Arc::new(backend),
//!         config.emoji_api_tokens.clone(),
//!         config.workers,
//!         config.sentence_limit,
//!     );
//!
//!     let reply = client.generate_reply("你好，世界").await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
// Module declarations
pub mod api;
pub mod assemble;
pub mod core;
pub mod emoji;
pub mod errors;
pub mod line;
pub mod segment;
pub mod storage;

/// Configure structured logging for the bot process.
///
/// Sets up tracing-subscriber with an env-filter (`RUST_LOG`) defaulting to
/// `info`. Call once at startup.
pub fn setup_logging() {
    use tracing_subscriber::{EnvFilter, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
