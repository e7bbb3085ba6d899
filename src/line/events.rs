//! Serde model of the LINE webhook payload.
//!
//! Only the fields the bot actually reads are modeled; serde ignores the
//! rest. Event kinds form a closed tagged union so dispatch can match
//! exhaustively, with `Unknown` soaking up kinds added by the platform.

use serde::Deserialize;

/// One webhook POST: a batch of events for a single bot destination.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    Message {
        reply_token: String,
        source: Source,
        message: MessageContent,
    },
    Postback {
        reply_token: String,
        source: Source,
        postback: Postback,
    },
    Join {
        reply_token: String,
        source: Source,
    },
    Leave {
        source: Source,
    },
    Follow {
        source: Source,
    },
    Unfollow {
        source: Source,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MessageContent {
    Text { id: String, text: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    pub data: String,
}

/// Where an event came from: a 1:1 chat, a group or a room.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Source {
    User {
        user_id: String,
    },
    Group {
        group_id: String,
        user_id: Option<String>,
    },
    Room {
        room_id: String,
        user_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl Source {
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Source::User { user_id } => Some(user_id),
            Source::Group { user_id, .. } | Source::Room { user_id, .. } => user_id.as_deref(),
            Source::Unknown => None,
        }
    }

    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        match self {
            Source::Group { group_id, .. } => Some(group_id),
            Source::User { .. } | Source::Room { .. } | Source::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_message_event() {
        let body = r#"{
            "destination": "U0000",
            "events": [{
                "type": "message",
                "replyToken": "rt-1",
                "source": {"type": "group", "groupId": "G1", "userId": "U1"},
                "message": {"type": "text", "id": "m1", "text": "@哈哈狗 你好"}
            }]
        }"#;

        let request: WebhookRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.events.len(), 1);
        match &request.events[0] {
            Event::Message { reply_token, source, message } => {
                assert_eq!(reply_token, "rt-1");
                assert_eq!(source.group_id(), Some("G1"));
                assert_eq!(source.user_id(), Some("U1"));
                match message {
                    MessageContent::Text { text, .. } => assert_eq!(text, "@哈哈狗 你好"),
                    MessageContent::Unknown => panic!("expected text message"),
                }
            }
            other => panic!("expected message event, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_kind_is_tolerated() {
        let body = r#"{"events": [{"type": "videoPlayComplete"}]}"#;
        let request: WebhookRequest = serde_json::from_str(body).unwrap();
        assert!(matches!(request.events[0], Event::Unknown));
    }

    #[test]
    fn test_non_text_message_is_unknown_content() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "rt-2",
                "source": {"type": "user", "userId": "U2"},
                "message": {"type": "sticker", "id": "m2"}
            }]
        }"#;
        let request: WebhookRequest = serde_json::from_str(body).unwrap();
        match &request.events[0] {
            Event::Message { message, .. } => assert!(matches!(message, MessageContent::Unknown)),
            other => panic!("expected message event, got {other:?}"),
        }
    }
}
