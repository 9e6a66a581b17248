use std::sync::Arc;

use anyhow::Context;

use crate::completion::{CompletionClient, OpenAiClient};
use crate::config::AppConfig;
use crate::messaging::{MessagingClient, TwilioClient};
use crate::users::{repo, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub messaging: Arc<dyn MessagingClient>,
    pub completion: Arc<dyn CompletionClient>,
}

impl AppState {
    /// Connects the store, applies migrations and builds the provider clients.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let users = repo::connect(&config.database)
            .await
            .context("connect to database")?;
        users.migrate().await.context("run migrations")?;

        let messaging = Arc::new(
            TwilioClient::new(&config.twilio, config.http_timeout)
                .context("build messaging client")?,
        ) as Arc<dyn MessagingClient>;

        let completion = Arc::new(
            OpenAiClient::new(&config.openai, config.http_timeout)
                .context("build completion client")?,
        ) as Arc<dyn CompletionClient>;

        Ok(Self::from_parts(config, users, messaging, completion))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        messaging: Arc<dyn MessagingClient>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            config,
            users,
            messaging,
            completion,
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::{
        extract::State,
        http::{header, HeaderMap, StatusCode, Uri},
        Router,
    };

    use super::*;
    use crate::completion::CompletionError;
    use crate::messaging::{MessageId, SendError};
    use crate::users::repo::SqliteUserStore;

    pub fn test_config() -> AppConfig {
        AppConfig::from_lookup(|key| {
            let v = match key {
                "OPENAI_API_KEY" => "sk-test",
                "TWILIO_ACCOUNT_SID" => "AC-test",
                "TWILIO_AUTH_TOKEN" => "token",
                "TWILIO_PHONE_NUMBER" => "+15550001111",
                "DATABASE_URL" => "sqlite::memory:",
                _ => return None,
            };
            Some(v.to_string())
        })
        .expect("test config")
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentMessage {
        pub to: String,
        pub from: String,
        pub body: String,
    }

    /// Records every send. Sends whose body matches `fail_on` are rejected.
    #[derive(Default)]
    pub struct RecordingMessenger {
        pub sent: Mutex<Vec<SentMessage>>,
        pub fail_on: Option<String>,
        pub fail_all: bool,
    }

    impl RecordingMessenger {
        pub fn sent(&self) -> Vec<SentMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingClient for RecordingMessenger {
        async fn send(&self, to: &str, from: &str, body: &str) -> Result<MessageId, SendError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(SentMessage {
                to: to.into(),
                from: from.into(),
                body: body.into(),
            });
            if self.fail_all || self.fail_on.as_deref() == Some(body) {
                return Err(SendError::Api {
                    status: 400,
                    message: "The 'To' number is not a valid phone number.".into(),
                });
            }
            Ok(format!("SM{:04}", sent.len()))
        }
    }

    pub struct ScriptedCompletion {
        pub reply: Result<String, String>,
        pub calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedCompletion {
        pub fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(
            &self,
            system_prompt: &str,
            user_message: &str,
        ) -> Result<String, CompletionError> {
            self.calls
                .lock()
                .unwrap()
                .push((system_prompt.into(), user_message.into()));
            self.reply.clone().map_err(|message| CompletionError::Api {
                status: 429,
                message,
            })
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    pub async fn sqlite_store() -> Arc<SqliteUserStore> {
        let store = SqliteUserStore::in_memory().await.expect("in-memory sqlite");
        store.migrate().await.expect("migrate");
        Arc::new(store)
    }

    /// What a provider stub saw on the wire.
    #[derive(Debug, Clone)]
    pub struct CapturedRequest {
        pub method: String,
        pub path: String,
        pub authorization: Option<String>,
        pub content_type: Option<String>,
        pub body: String,
    }

    #[derive(Clone)]
    struct StubState {
        captured: Arc<Mutex<Vec<CapturedRequest>>>,
        status: StatusCode,
        reply: &'static str,
    }

    /// Local HTTP server standing in for Twilio/OpenAI. Answers every request
    /// with a fixed status and JSON body.
    pub struct ProviderStub {
        pub base_url: String,
        captured: Arc<Mutex<Vec<CapturedRequest>>>,
    }

    impl ProviderStub {
        pub async fn start(status: StatusCode, reply: &'static str) -> Self {
            let captured = Arc::new(Mutex::new(Vec::new()));
            let app = Router::new().fallback(record).with_state(StubState {
                captured: captured.clone(),
                status,
                reply,
            });

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind stub");
            let addr = listener.local_addr().expect("stub addr");
            tokio::spawn(async move {
                axum::serve(listener, app).await.expect("stub server");
            });

            Self {
                base_url: format!("http://{}", addr),
                captured,
            }
        }

        pub fn requests(&self) -> Vec<CapturedRequest> {
            self.captured.lock().unwrap().clone()
        }
    }

    async fn record(
        State(stub): State<StubState>,
        method: axum::http::Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
        let header_value = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        stub.captured.lock().unwrap().push(CapturedRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            authorization: header_value(header::AUTHORIZATION),
            content_type: header_value(header::CONTENT_TYPE),
            body,
        });
        (
            stub.status,
            [(header::CONTENT_TYPE, "application/json")],
            stub.reply,
        )
    }
}
