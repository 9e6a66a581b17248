use serde::{Deserialize, Serialize};

use crate::messaging::MessageId;

/// Inbound Twilio webhook form. Twilio posts many more fields; only these are read.
#[derive(Debug, Default, Deserialize)]
pub struct InboundSms {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From", default)]
    pub from: String,
}

impl InboundSms {
    /// Fills blank fields from `fallback`.
    pub fn or(self, fallback: InboundSms) -> Self {
        fn pick(primary: String, fallback: String) -> String {
            if primary.trim().is_empty() {
                fallback
            } else {
                primary
            }
        }
        Self {
            body: pick(self.body, fallback.body),
            from: pick(self.from, fallback.from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookReply {
    pub status: &'static str,
    pub message_sid: MessageId,
}

impl WebhookReply {
    pub fn success(message_sid: MessageId) -> Self {
        Self {
            status: "success",
            message_sid,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_sid: Option<MessageId>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub model: String,
}
