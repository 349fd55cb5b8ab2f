//! API error responses
//!
//! Every failure leaves as `{ "success": false, "error", "details" }`.
//! `details` is filled by handlers only outside production.

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<String>,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    ServiceUnavailable {
        message: String,
        details: Option<String>,
    },

    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>, details: Option<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>, details: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Attach details to a validation error
    pub fn with_details(self, extra: Option<String>) -> Self {
        match self {
            Self::Validation { message, .. } => Self::Validation {
                message,
                details: extra,
            },
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::Validation { details, .. }
            | Self::ServiceUnavailable { details, .. }
            | Self::Internal { details, .. } => details.clone(),
            Self::Forbidden(_) => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, details = ?self.details(), "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

/// Response for a handler that panicked. The panic message is exposed as
/// details outside production.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>, production: bool) -> Response {
    let details = if production {
        None
    } else if let Some(message) = err.downcast_ref::<&str>() {
        Some(message.to_string())
    } else if let Some(message) = err.downcast_ref::<String>() {
        Some(message.clone())
    } else {
        Some("Unknown panic".to_string())
    };

    ApiError::internal("Internal Server Error", details).into_response()
}
