use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

/// Pipeline errors. Per-recipient delivery failures never end up here; they are
/// tallied into a `BroadcastResult` instead.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Alert not found: {0}")]
    AlertNotFound(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid action")]
    UnknownAction(Option<String>),
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for BotError {
    fn into_response(self) -> Response {
        match self {
            BotError::UnknownAction(action) => {
                tracing::warn!(?action, "rejecting unknown action");
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "Invalid action" })),
                )
                    .into_response()
            }
            err => {
                error!(error = %err, "alert bot request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": err.to_string(), "success": false })),
                )
                    .into_response()
            }
        }
    }
}
