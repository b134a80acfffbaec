//! LINE Webhook 事件解码
//!
//! 只关心文本消息事件；sticker、关注、加群等其他事件原样跳过。
//! 签名校验不在这里做，由上游负责。

use serde::Deserialize;

/// Webhook 请求体（destination 等未用字段直接忽略）
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// 一条可处理的文本消息（借用自事件本体）
#[derive(Debug)]
pub struct TextMessageEvent<'a> {
    pub reply_token: &'a str,
    pub user_id: &'a str,
    pub text: &'a str,
}

impl WebhookEvent {
    /// 提取文本消息要素；非文本消息或字段缺失时返回 None
    pub fn as_text_message(&self) -> Option<TextMessageEvent<'_>> {
        if self.event_type != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.message_type != "text" {
            return None;
        }
        Some(TextMessageEvent {
            reply_token: self.reply_token.as_deref()?,
            user_id: self.source.as_ref()?.user_id.as_deref()?,
            text: message.text.as_deref()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_message_event() {
        let body = r#"{
            "destination": "xxx",
            "events": [{
                "type": "message",
                "replyToken": "reply-1",
                "source": {"type": "user", "userId": "U123"},
                "message": {"type": "text", "id": "1", "text": "hello"}
            }]
        }"#;

        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.events.len(), 1);

        let msg = envelope.events[0].as_text_message().unwrap();
        assert_eq!(msg.reply_token, "reply-1");
        assert_eq!(msg.user_id, "U123");
        assert_eq!(msg.text, "hello");
    }

    #[test]
    fn test_non_text_events_are_skipped() {
        let body = r#"{
            "events": [
                {"type": "follow", "replyToken": "r1", "source": {"type": "user", "userId": "U1"}},
                {
                    "type": "message",
                    "replyToken": "r2",
                    "source": {"type": "user", "userId": "U1"},
                    "message": {"type": "sticker", "id": "2"}
                }
            ]
        }"#;

        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope
            .events
            .iter()
            .all(|e| e.as_text_message().is_none()));
    }
}
