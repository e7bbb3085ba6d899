//! Emoji query client.
//!
//! Owns everything between "a stripped user message" and "the reply text":
//! segmentation, the per-sentence fan-out against the generation backend,
//! memoization, credential rotation on failure, output post-processing and
//! the final reassembly.

use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::assemble::interleave;
use crate::emoji::backend::GenerationBackend;
use crate::errors::BotError;
use crate::segment::segment;

/// Task prefix the EmojiLM model was trained with.
pub const INPUT_TASK_PREFIX: &str = "emoji: ";

/// Marker used by the keep-alive pinger. A random suffix is appended per
/// ping so neither our cache nor the provider's serves a stale answer.
pub const KEEP_ALIVE_MARKER: &str = "👋";

const CACHE_CAPACITY: usize = 1024;

static CODE_POINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(.*?)>").expect("code point regex must compile"));

/// Client for the emoji generation pipeline.
///
/// Constructed once at startup and shared (via `Arc`) between the request
/// handler and the keep-alive pinger. All state is process-local and rebuilt
/// on restart.
pub struct EmojiClient {
    backend: Arc<dyn GenerationBackend>,
    tokens: Vec<String>,
    token_idx: AtomicUsize,
    semaphore: Semaphore,
    cache: Mutex<LruCache<String, String>>,
    last_query: Mutex<Instant>,
    sentence_limit: usize,
}

impl EmojiClient {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        tokens: Vec<String>,
        workers: usize,
        sentence_limit: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).expect("cache capacity is non-zero");
        Self {
            backend,
            tokens,
            token_idx: AtomicUsize::new(0),
            semaphore: Semaphore::new(workers),
            cache: Mutex::new(LruCache::new(capacity)),
            last_query: Mutex::new(Instant::now()),
            // The truncation notice indexes the last sentence within the
            // limit; a limit of zero must never reach that path.
            sentence_limit: sentence_limit.max(1),
        }
    }

    /// Generate the emoji-interleaved reply for one stripped user message.
    ///
    /// Messages with more sentences than the configured limit are rejected
    /// up front with a truncation notice; no backend calls are made for
    /// them.
    ///
    /// # Errors
    ///
    /// Returns an error when a sentence query fails twice in a row (once on
    /// the original credential, once after rotating).
    pub async fn generate_reply(&self, input: &str) -> Result<String, BotError> {
        let segments = segment(input);
        debug!(sentences = segments.sentences.len(), "segmented input");

        if segments.sentences.len() > self.sentence_limit {
            warn!(
                count = segments.sentences.len(),
                limit = self.sentence_limit,
                "input text too long"
            );
            let last_within_limit = &segments.sentences[self.sentence_limit - 1];
            return Ok(truncation_message(
                segments.sentences.len(),
                self.sentence_limit,
                last_within_limit,
            ));
        }

        let queries = segments
            .sentences
            .iter()
            .map(|sentence| self.query_owned(format!("{INPUT_TASK_PREFIX}{sentence}")));
        let fragments = futures::future::try_join_all(queries).await?;

        self.touch().await;

        Ok(interleave(&segments.sentences, &fragments, &segments.delimiters))
    }

    async fn query_owned(&self, input: String) -> Result<String, BotError> {
        self.query(&input).await
    }

    /// Query the backend for one prefixed sentence, memoized.
    ///
    /// On a structural failure (missing `generated_text`) or transport error
    /// the client rotates to the next credential and retries exactly once.
    ///
    /// # Errors
    ///
    /// Propagates the second failure; callers treat it as a hard failure for
    /// the whole reply.
    pub async fn query(&self, input: &str) -> Result<String, BotError> {
        if let Some(hit) = self.cache.lock().await.get(input) {
            debug!(input = %input, "query cache hit");
            return Ok(hit.clone());
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| BotError::BackendError(format!("Worker pool closed: {e}")))?;

        let raw = match self.query_backend(input).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Generation failed, rotating API token and retrying once: {e}");
                self.rotate_token();
                self.query_backend(input).await?
            }
        };

        let output = post_process_output(&raw);
        info!(input = %input, output = %output, "generated fragment");

        self.cache
            .lock()
            .await
            .put(input.to_string(), output.clone());

        Ok(output)
    }

    async fn query_backend(&self, input: &str) -> Result<String, BotError> {
        let token = &self.tokens[self.token_idx.load(Ordering::Relaxed) % self.tokens.len()];
        let response = self.backend.generate(input, token).await?;
        extract_generated_text(&response)
    }

    fn rotate_token(&self) {
        let next = self.token_idx.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Using API token {}", next % self.tokens.len());
    }

    /// Drop one entry from the query cache.
    pub async fn invalidate(&self, input: &str) {
        self.cache.lock().await.pop(input);
    }

    /// Record that a real query just happened. The keep-alive pinger reads
    /// this to decide whether the backend needs a ping.
    pub async fn touch(&self) {
        *self.last_query.lock().await = Instant::now();
    }

    /// Time elapsed since the last query.
    pub async fn idle_for(&self) -> Duration {
        self.last_query.lock().await.elapsed()
    }
}

fn extract_generated_text(response: &serde_json::Value) -> Result<String, BotError> {
    response
        .get(0)
        .and_then(|entry| entry.get("generated_text"))
        .and_then(|text| text.as_str())
        .map(str::to_string)
        .ok_or_else(|| BotError::BackendError(format!("No generated_text in response: {response}")))
}

fn truncation_message(count: usize, limit: usize, last_sentence: &str) -> String {
    let chars: Vec<char> = last_sentence.chars().collect();
    let tail = if chars.len() >= 5 {
        let suffix: String = chars[chars.len() - 5..].iter().collect();
        format!("...{suffix}")
    } else {
        last_sentence.to_string()
    };
    format!("太長了啦❗️ 你輸入了{count}句 目前限制{limit}句話 大概到這邊而已：「{tail}」")
}

/// Clean up one raw model output into a fragment safe to splice into the
/// reply: decode code-point escapes, then keep only emoji characters.
fn post_process_output(raw: &str) -> String {
    let decoded = decode_code_points(raw);

    let filtered: String = decoded
        .chars()
        .filter(|c| {
            let mut buf = [0u8; 4];
            emojis::get(c.encode_utf8(&mut buf)).is_some()
        })
        .collect();

    if filtered != decoded {
        warn!(raw = %decoded, kept = %filtered, "model output contained non-emoji characters");
    }

    filtered
}

/// Some model outputs arrive as escaped UTF-8 byte sequences like
/// `<F0><9F><98><80>`. Decode them back into real characters; on any parse
/// error the input is returned untouched.
fn decode_code_points(output: &str) -> String {
    if !output.starts_with('<') {
        return output.to_string();
    }

    let mut bytes = Vec::new();
    for capture in CODE_POINT_RE.captures_iter(output) {
        match u8::from_str_radix(&capture[1], 16) {
            Ok(byte) => bytes.push(byte),
            Err(_) => return output.to_string(),
        }
    }

    String::from_utf8(bytes).unwrap_or_else(|_| output.to_string())
}
