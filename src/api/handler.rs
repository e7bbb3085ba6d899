//! Webhook request handler.
//!
//! One axum route receives the signed event batch, verifies the signature,
//! and dispatches each event by kind. Message events carrying the mention
//! marker run the generation pipeline under a timeout; everything the user
//! sees on failure is one of the canned messages below.

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::config::AppConfig;
use crate::emoji::EmojiClient;
use crate::errors::BotError;
use crate::line::client::feedback_quick_reply;
use crate::line::signature::verify_line_signature;
use crate::line::{Event, LineClient, MessageContent, Source, WebhookRequest};
use crate::storage::Analytics;

pub const BOT_NAME: &str = "哈哈狗";

const MENTION: &str = "@哈哈狗";
const MENTION_FULLWIDTH: &str = "＠哈哈狗";
const HELP_COMMAND: &str = "哈哈狗幫幫我";

const OVERLOADED_MESSAGE: &str = "幹太多人用壞掉了 可能下個小時才會好";
const APOLOGY_MESSAGE: &str = "不好意思我剛剛當掉了 等等再試一次 🙏";
const FEEDBACK_THANKS_MESSAGE: &str = "謝謝回饋 🙏";

fn help_message() -> String {
    format!("在訊息前或後+上 @{BOT_NAME} 就會幫你+emoji\nEX: @{BOT_NAME} 那你很厲害誒")
}

/// Shared application state, constructed once at startup and passed by
/// reference to every handler. No ambient globals.
pub struct AppState {
    pub config: AppConfig,
    pub emoji: Arc<EmojiClient>,
    pub line: LineClient,
    pub analytics: Option<Analytics>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/callback", post(callback))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK\n"
}

async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    let signature = headers
        .get("x-line-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !verify_line_signature(&body, signature, &state.config.channel_secret) {
        return (StatusCode::BAD_REQUEST, "Invalid signature");
    }

    let request: WebhookRequest = match serde_json::from_str(&body).map_err(BotError::from) {
        Ok(request) => request,
        Err(e) => {
            error!("{e}");
            return (StatusCode::BAD_REQUEST, "Malformed payload");
        }
    };

    // No ordering guarantee across the batch is promised; events are simply
    // handled in arrival order.
    for event in request.events {
        dispatch_event(&state, event).await;
    }

    (StatusCode::OK, "OK\n")
}

async fn dispatch_event(state: &Arc<AppState>, event: Event) {
    match event {
        Event::Message { reply_token, source, message } => match message {
            MessageContent::Text { text, .. } => {
                handle_text_message(state, &reply_token, &source, &text).await;
            }
            MessageContent::Unknown => debug!("ignoring non-text message"),
        },
        Event::Postback { reply_token, source, postback } => {
            handle_postback(state, &reply_token, &source, &postback.data).await;
        }
        Event::Join { reply_token, source } => {
            info!(group = ?source.group_id(), "joined group");
            record_group(state, &source, None, 0).await;
            send_reply(state, &reply_token, &help_message(), None).await;
        }
        Event::Leave { source } => {
            warn!(group = ?source.group_id(), "removed from group");
            record_group(state, &source, Some(true), 0).await;
        }
        Event::Follow { source } => {
            info!(user = ?source.user_id(), "followed");
            record_user(state, &source, 0, None, 0).await;
        }
        Event::Unfollow { source } => {
            warn!(user = ?source.user_id(), "blocked");
            record_user(state, &source, 0, Some(true), 0).await;
        }
        Event::Unknown => debug!("ignoring unknown event kind"),
    }
}

async fn handle_text_message(
    state: &Arc<AppState>,
    reply_token: &str,
    source: &Source,
    text: &str,
) {
    debug!(text = %text, "got message");
    let input = text.trim();

    if input == HELP_COMMAND {
        info!(user = ?source.user_id(), "help requested");
        record_user(state, source, 1, None, 0).await;
        send_reply(state, reply_token, &help_message(), None).await;
        return;
    }

    // Not addressed to the bot: stay silent.
    let Some(stripped) = strip_mention(input) else {
        return;
    };

    record_user(state, source, 0, None, 1).await;
    record_group(state, source, None, 1).await;

    let emoji = Arc::clone(&state.emoji);
    let owned_input = stripped.to_string();
    let task = tokio::spawn(async move { emoji.generate_reply(&owned_input).await });

    // The timeout only bounds what the user waits for. The spawned task is
    // left running so a slow generation still lands in the cache and the
    // next identical message answers instantly.
    let timeout = Duration::from_secs(state.config.reply_timeout_secs);
    let (output, generated) = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(output))) => (output, true),
        Ok(Ok(Err(e @ (BotError::BackendError(_) | BotError::HttpError(_))))) => {
            error!("Generation backend failed: {e}");
            (OVERLOADED_MESSAGE.to_string(), false)
        }
        Ok(Ok(Err(e))) => {
            error!("Generation failed: {e}");
            (APOLOGY_MESSAGE.to_string(), false)
        }
        Ok(Err(e)) => {
            error!("Generation task panicked: {e}");
            (APOLOGY_MESSAGE.to_string(), false)
        }
        Err(_) => {
            warn!("Reply timed out after {}s", state.config.reply_timeout_secs);
            (APOLOGY_MESSAGE.to_string(), false)
        }
    };

    // Canned failure text is not model output; only real generations get
    // rated and stored.
    let quick_reply = if generated {
        record_feedback(state, source, stripped, &output)
            .await
            .map(feedback_quick_reply)
    } else {
        None
    };

    send_reply(state, reply_token, &output, quick_reply).await;
}

async fn handle_postback(state: &Arc<AppState>, reply_token: &str, source: &Source, data: &str) {
    let Some((feedback_id, preference)) = parse_feedback_postback(data) else {
        debug!(data = %data, "ignoring unrecognized postback");
        return;
    };

    info!(feedback_id, preference, user = ?source.user_id(), "feedback received");

    if let Some(analytics) = &state.analytics {
        if let Err(e) = analytics.update_feedback_preference(feedback_id, preference).await {
            warn!("Analytics update_feedback_preference failed: {e}");
        }
    }

    send_reply(state, reply_token, FEEDBACK_THANKS_MESSAGE, None).await;
}

/// Strip the mention marker if the message is addressed to the bot.
/// Accepts the halfwidth marker as a prefix and either width as a suffix.
fn strip_mention(input: &str) -> Option<&str> {
    if let Some(rest) = input
        .strip_prefix(MENTION)
        .or_else(|| input.strip_prefix(MENTION_FULLWIDTH))
    {
        return Some(rest.trim_start());
    }
    if let Some(rest) = input
        .strip_suffix(MENTION)
        .or_else(|| input.strip_suffix(MENTION_FULLWIDTH))
    {
        return Some(rest.trim_end());
    }
    None
}

fn parse_feedback_postback(data: &str) -> Option<(i64, i64)> {
    let mut feedback_id = None;
    let mut preference = None;
    for pair in data.split('&') {
        let (key, value) = pair.split_once('=')?;
        match key {
            "feedback" => feedback_id = value.parse().ok(),
            "preference" => preference = value.parse().ok(),
            _ => {}
        }
    }
    Some((feedback_id?, preference?))
}

// ============================================================================
// Reply and analytics helpers
// ============================================================================

async fn send_reply(state: &AppState, reply_token: &str, text: &str, quick_reply: Option<Value>) {
    if let Err(e) = state.line.reply(reply_token, text, quick_reply).await {
        // Reply tokens are single-use and expire; nothing to do but log.
        error!("Failed to send reply: {e}");
    }
}

async fn record_user(
    state: &AppState,
    source: &Source,
    help_count_inc: i64,
    block: Option<bool>,
    msg_count_inc: i64,
) {
    let Some(analytics) = &state.analytics else { return };
    let Some(user_id) = source.user_id() else { return };
    if let Err(e) = analytics
        .upsert_user(user_id, help_count_inc, block, msg_count_inc)
        .await
    {
        warn!("Analytics upsert_user failed: {e}");
    }
}

async fn record_group(
    state: &AppState,
    source: &Source,
    leave: Option<bool>,
    msg_count_inc: i64,
) {
    let Some(analytics) = &state.analytics else { return };
    let Some(group_id) = source.group_id() else { return };
    if let Err(e) = analytics.upsert_group(group_id, leave, msg_count_inc).await {
        warn!("Analytics upsert_group failed: {e}");
    }
}

async fn record_feedback(
    state: &AppState,
    source: &Source,
    input: &str,
    output: &str,
) -> Option<i64> {
    let analytics = state.analytics.as_ref()?;
    let user_id = source.user_id()?;
    match analytics.insert_feedback(input, output, user_id).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Analytics insert_feedback failed: {e}");
            None
        }
    }
}
