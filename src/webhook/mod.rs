use crate::state::AppState;
use axum::Router;

mod dto;
mod error;
pub mod handlers;

pub use error::WebhookError;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::status_routes())
        .merge(handlers::webhook_routes())
}
