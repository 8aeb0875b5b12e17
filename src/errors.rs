use crate::{models::key::KeyError, services::object_store::StoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Every way a gateway request can fail, tagged with how it is rendered.
///
/// Backend failures keep the backend's own status and error code so that
/// operators can read them against the backend's documentation.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid storage key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("{0}")]
    BadRequest(String),

    #[error("object `{0}` not found")]
    NotFound(String),

    #[error("{message}")]
    BackendRejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidKey(_) | GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BackendRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Transport(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable error code.
    pub fn code(&self) -> &str {
        match self {
            GatewayError::InvalidKey(_) => "InvalidKey",
            GatewayError::BadRequest(_) => "BadRequest",
            GatewayError::NotFound(_) => "NoSuchKey",
            GatewayError::BackendRejected { code, .. } => code,
            GatewayError::BackendUnavailable(_) => "BackendUnavailable",
            GatewayError::Transport(_) => "TransportError",
            GatewayError::Unhandled(_) => "InternalError",
        }
    }

    /// Operator-facing diagnostics, attached to server-side failures only.
    fn detail(&self) -> Option<String> {
        match self {
            GatewayError::Unhandled(err) => Some(format!("{:?}", err)),
            GatewayError::Transport(msg) | GatewayError::BackendUnavailable(msg) => {
                Some(msg.clone())
            }
            _ => None,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => GatewayError::NotFound(key.into_string()),
            StoreError::BackendRejected {
                status,
                code,
                message,
            } => GatewayError::BackendRejected {
                status,
                code,
                message,
            },
            StoreError::BackendUnavailable(msg) => GatewayError::BackendUnavailable(msg),
            StoreError::Transport(msg) => GatewayError::Transport(msg),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "request failed: {:?}", self);
        }

        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        });
        if let Some(detail) = self.detail() {
            body["detail"] = json!(detail);
        }

        (status, Json(body)).into_response()
    }
}
