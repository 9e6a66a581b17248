use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OpenAiConfig;

pub const SYSTEM_PROMPT: &str = "You are a helpful calendar assistant responding via SMS. \
                                 Keep responses concise and friendly.";

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("completion API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed completion response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Single-turn completion: one system message, one user message, no history.
    async fn complete(&self, system_prompt: &str, user_message: &str)
        -> Result<String, CompletionError>;

    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI chat-completions client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        let reply = first_reply(&body)?;
        debug!(model = %self.model, chars = reply.len(), "completion received");
        Ok(reply)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn api_error(status: u16, body: &str) -> CompletionError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.to_string(),
    };
    CompletionError::Api { status, message }
}

fn first_reply(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::Malformed("no choices in response".into()))?;
    choice
        .message
        .content
        .ok_or_else(|| CompletionError::Malformed("first choice has no content".into()))
}
