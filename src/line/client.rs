//! LINE Messaging API client.
//!
//! Thin reqwest wrapper around the reply endpoint. The bot only ever sends
//! plain text, optionally with feedback quick-reply buttons.

use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

use crate::errors::BotError;

const REPLY_URL: &str = "https://api.line.me/v2/bot/message/reply";

pub struct LineClient {
    http: Client,
    access_token: String,
    reply_url: String,
}

impl LineClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(access_token: String) -> Result<Self, BotError> {
        Self::with_endpoint(access_token, REPLY_URL.to_string())
    }

    /// Build a client against a non-default reply endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_endpoint(access_token: String, reply_url: String) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BotError::HttpError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, access_token, reply_url })
    }

    /// Send one text reply for a webhook event's reply token.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status from
    /// the platform.
    pub async fn reply(
        &self,
        reply_token: &str,
        text: &str,
        quick_reply: Option<Value>,
    ) -> Result<(), BotError> {
        let mut message = json!({"type": "text", "text": text});
        if let Some(quick_reply) = quick_reply {
            message["quickReply"] = quick_reply;
        }

        let payload = json!({
            "replyToken": reply_token,
            "messages": [message],
        });

        let response = self
            .http
            .post(&self.reply_url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BotError::HttpError(format!("Reply request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response body: {e}"));
            return Err(BotError::PlatformError(format!(
                "Reply rejected (status {status}): {body}"
            )));
        }

        Ok(())
    }
}

/// Quick-reply buttons asking the user to rate one generated reply. The
/// postback data round-trips the feedback row id.
#[must_use]
pub fn feedback_quick_reply(feedback_id: i64) -> Value {
    json!({
        "items": [
            {
                "type": "action",
                "action": {
                    "type": "postback",
                    "label": "👍",
                    "data": format!("feedback={feedback_id}&preference=1"),
                    "displayText": "👍"
                }
            },
            {
                "type": "action",
                "action": {
                    "type": "postback",
                    "label": "👎",
                    "data": format!("feedback={feedback_id}&preference=-1"),
                    "displayText": "👎"
                }
            }
        ]
    })
}
