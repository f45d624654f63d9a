use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Error kinds surfaced by the HTTP boundary. Every handler failure is one of
/// these; nothing is allowed to escape as a panic or a bare 500.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed required input (400).
    #[error("{0}")]
    Validation(String),
    /// Duplicate email (409).
    #[error("{0}")]
    Conflict(String),
    /// Bad credentials or an invalid/expired/missing token (401).
    #[error("{0}")]
    Auth(String),
    /// A resolved entity no longer exists (404).
    #[error("{0}")]
    NotFound(String),
    /// Required deployment configuration is absent (500).
    #[error("{0}")]
    Config(String),
    /// A downstream HTTP dependency failed or was unreachable (500). The
    /// upstream payload rides along in `details` for diagnostics only.
    #[error("{message}")]
    Upstream {
        message: String,
        details: Option<serde_json::Value>,
    },
    /// Anything unanticipated (500).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn upstream(message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self::Upstream {
            message: message.into(),
            details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Config(_) | ApiError::Upstream { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let details = match &self {
            ApiError::Upstream { details, .. } => details.clone(),
            _ => None,
        };
        let body = ErrorBody {
            message: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
