mod app;
mod completion;
mod config;
mod messaging;
mod state;
mod users;
mod webhook;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "sms_assistant=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    // Fail fast on bad configuration rather than on the first webhook.
    let config = AppConfig::from_env()?;
    tracing::info!(
        database = config.database.backend(),
        model = %config.openai.model,
        "configuration loaded"
    );

    let app_state = AppState::init(config).await?;
    let app = app::build_app(app_state);
    app::serve(app).await
}
