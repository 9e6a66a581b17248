use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::completion::CompletionError;
use crate::messaging::{MessageId, SendError};
use crate::users::StoreError;
use crate::webhook::dto::ErrorReply;

const MISSING_FIELDS: &str = "Missing message or sender";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing message or sender")]
    MissingFields,

    #[error("{0}")]
    Store(#[from] StoreError),

    /// The apology was attempted; `apology_sid` is set when it went out.
    #[error("{source}")]
    Completion {
        source: CompletionError,
        apology_sid: Option<MessageId>,
    },

    #[error("{0}")]
    Send(#[from] SendError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, reply) = match self {
            WebhookError::MissingFields => (
                StatusCode::BAD_REQUEST,
                ErrorReply {
                    status: None,
                    error: MISSING_FIELDS.to_string(),
                    message_sid: None,
                },
            ),
            WebhookError::Store(ref e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorReply {
                    status: Some("error"),
                    error: e.to_string(),
                    message_sid: None,
                },
            ),
            WebhookError::Completion {
                source,
                apology_sid,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorReply {
                    status: Some("error"),
                    error: source.to_string(),
                    message_sid: apology_sid,
                },
            ),
            WebhookError::Send(ref e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorReply {
                    status: None,
                    error: e.to_string(),
                    message_sid: None,
                },
            ),
        };
        (status, Json(reply)).into_response()
    }
}
