use axum::{
    extract::{rejection::FormRejection, Query, State},
    routing::{get, post},
    Form, Json, Router,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    completion::SYSTEM_PROMPT,
    state::AppState,
    users::onboarding,
    webhook::{
        dto::{InboundSms, ServiceStatus, WebhookReply},
        WebhookError,
    },
};

pub const APOLOGY_MESSAGE: &str =
    "I apologize, but I am having trouble generating a response. Please try again.";

pub fn status_routes() -> Router<AppState> {
    Router::new().route("/", get(service_status))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/api/webhook", post(receive_sms))
}

pub async fn service_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "running",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        database: state.users.backend(),
        model: state.completion.model().to_string(),
    })
}

/// POST /api/webhook (Twilio inbound SMS)
///
/// `Body`/`From` are read from the form, falling back to the query string.
#[instrument(skip_all, fields(from = tracing::field::Empty, user_id = tracing::field::Empty))]
pub async fn receive_sms(
    State(state): State<AppState>,
    query: Option<Query<InboundSms>>,
    form: Result<Form<InboundSms>, FormRejection>,
) -> Result<Json<WebhookReply>, WebhookError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let inbound = match form {
        Ok(Form(inbound)) => inbound.or(query),
        Err(e) => {
            debug!(error = %e, "no readable form body; using query string");
            query
        }
    };

    let body = inbound.body.trim();
    let from = inbound.from.trim();
    if body.is_empty() || from.is_empty() {
        warn!("missing message or sender");
        return Err(WebhookError::MissingFields);
    }

    let span = tracing::Span::current();
    span.record("from", from);
    debug!(%body, "message received");

    let mut user = match state.users.get_or_create(from).await {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "get_or_create failed");
            return Err(e.into());
        }
    };
    span.record("user_id", user.id);

    if let Err(e) = state.users.touch_interaction(&mut user).await {
        warn!(error = %e, "touch_interaction failed; continuing");
    }

    let sender = state.config.twilio.phone_number.as_str();

    if let Some(welcome) = onboarding::decide(&user) {
        let sid = state.messaging.send(from, sender, welcome).await?;
        info!(message_sid = %sid, "onboarding reply sent");
        return Ok(Json(WebhookReply::success(sid)));
    }

    let reply = match state.completion.complete(SYSTEM_PROMPT, body).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "completion failed; sending apology");
            let apology_sid = match state.messaging.send(from, sender, APOLOGY_MESSAGE).await {
                Ok(sid) => Some(sid),
                Err(send_err) => {
                    error!(error = %send_err, "apology send failed");
                    None
                }
            };
            return Err(WebhookError::Completion {
                source: e,
                apology_sid,
            });
        }
    };
    debug!(%reply, "completion reply");

    let sid = state.messaging.send(from, sender, &reply).await?;
    info!(message_sid = %sid, "generated reply sent");
    Ok(Json(WebhookReply::success(sid)))
}
