use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Default EmojiLM serverless inference endpoint.
const DEFAULT_EMOJI_API_URL: &str =
    "https://api-inference.huggingface.co/models/liswei/EmojiLMSeq2SeqLoRA";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
    pub emoji_api_url: String,
    pub emoji_api_tokens: Vec<String>,
    pub database_url: Option<String>,
    /// Number of concurrently in-flight generation requests.
    pub workers: usize,
    /// Maximum sentence count before a message is rejected with a truncation
    /// notice instead of being sent to the backend.
    pub sentence_limit: usize,
    pub keep_alive_interval_secs: u64,
    /// User-facing timeout for the whole generate-plus-reply path.
    pub reply_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let emoji_api_tokens: Vec<String> = env::var("EMOJI_API_TOKENS")
            .map_err(|e| format!("EMOJI_API_TOKENS: {e}"))?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if emoji_api_tokens.is_empty() {
            return Err("EMOJI_API_TOKENS: expected at least one token".to_string());
        }

        let sentence_limit: usize = env_parse("SENTENCE_LIMIT", 300)?;
        if sentence_limit == 0 {
            return Err("SENTENCE_LIMIT: must be at least 1".to_string());
        }

        Ok(Self {
            channel_secret: env::var("LINE_CHANNEL_SECRET")
                .map_err(|e| format!("LINE_CHANNEL_SECRET: {e}"))?,
            channel_access_token: env::var("LINE_CHANNEL_ACCESS_TOKEN")
                .map_err(|e| format!("LINE_CHANNEL_ACCESS_TOKEN: {e}"))?,
            emoji_api_url: env::var("EMOJI_API_URL")
                .unwrap_or_else(|_| DEFAULT_EMOJI_API_URL.to_string()),
            emoji_api_tokens,
            database_url: env::var("DATABASE_URL").ok(),
            workers: env_parse("EMOJI_WORKERS", 8)?,
            sentence_limit,
            keep_alive_interval_secs: env_parse("KEEP_ALIVE_INTERVAL_SECS", 300)?,
            reply_timeout_secs: env_parse("REPLY_TIMEOUT_SECS", 60)?,
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => value.parse().map_err(|e| format!("{key}: {e}")),
        Err(_) => Ok(default),
    }
}
