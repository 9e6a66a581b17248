use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::info;

use crate::config::TwilioConfig;

/// Provider-assigned id of an outbound message (Twilio "SM…" sid).
pub type MessageId = String;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("send request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("messaging API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed send response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<MessageId, SendError>;
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: String,
    code: Option<i64>,
}

/// Twilio Programmable Messaging client.
#[derive(Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: SecretString,
    base_url: String,
}

impl TwilioClient {
    pub fn new(config: &TwilioConfig, timeout: Duration) -> Result<Self, SendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            base_url: config.base_url.clone(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

#[async_trait]
impl MessagingClient for TwilioClient {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<MessageId, SendError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }

        let sid = message_sid(&text)?;
        info!(%to, message_sid = %sid, "message sent");
        Ok(sid)
    }
}

fn api_error(status: u16, body: &str) -> SendError {
    let message = match serde_json::from_str::<TwilioErrorBody>(body) {
        Ok(TwilioErrorBody {
            message,
            code: Some(code),
        }) => format!("{} (code {})", message, code),
        Ok(TwilioErrorBody { message, code: None }) => message,
        Err(_) => body.to_string(),
    };
    SendError::Api { status, message }
}

fn message_sid(body: &str) -> Result<MessageId, SendError> {
    let resource: MessageResource =
        serde_json::from_str(body).map_err(|e| SendError::Malformed(e.to_string()))?;
    resource
        .sid
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SendError::Malformed("response has no sid".into()))
}
