mod routes;

pub use routes::create_router;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use storyteller_core::{Relay, RelayError};
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub start_time: std::time::Instant,
}

/// JSON response wrapper
#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error envelope returned by the API routes: `{ error, details }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error type for HTTP handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                success: None,
                error: msg.into(),
                details: None,
            },
        }
    }

    fn internal(error: &str, err: &RelayError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                success: None,
                error: error.to_string(),
                details: Some(err.to_string()),
            },
        }
    }

    /// Map a failed chat to its response.
    pub fn from_chat(err: RelayError) -> Self {
        match err.root() {
            RelayError::Validation(msg) => Self::bad_request(msg.clone()),
            RelayError::NoAgentAvailable => {
                Self::internal("Failed to create or retrieve an agent", &err)
            }
            _ => Self::internal("Internal server error", &err),
        }
    }

    /// Map a failed add-story to its response.
    pub fn from_story(err: RelayError) -> Self {
        match err.root() {
            RelayError::Validation(msg) => Self::bad_request(msg.clone()),
            _ => {
                let mut api = Self::internal("Failed to add new story", &err);
                api.body.success = Some(false);
                api
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                "{}: {}",
                self.body.error,
                self.body.details.as_deref().unwrap_or("")
            );
        }
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
