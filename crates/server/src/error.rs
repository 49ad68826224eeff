use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use reqflow_core::errors::{ApplicationError, DomainError, InterfaceError};
use reqflow_core::flows::FlowTransitionError;
use reqflow_core::forms::FormError;
use reqflow_core::wire::ErrorBody;
use reqflow_db::repositories::RepositoryError;

/// Error returned by every handler. Serialized as `{error, code}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Bad input with a fixed, user-facing message.
    #[error("{0}")]
    BadRequest(String),
    /// The record moved underneath the caller.
    #[error("{0}")]
    Conflict(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        Self::Application(value.into())
    }
}

impl From<FlowTransitionError> for ApiError {
    fn from(value: FlowTransitionError) -> Self {
        Self::Application(DomainError::from(value).into())
    }
}

impl From<FormError> for ApiError {
    fn from(value: FormError) -> Self {
        Self::Application(DomainError::from(value).into())
    }
}

impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Application(ApplicationError::Forbidden(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Application(ApplicationError::NotFound(message.into()))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let (status, code, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            Self::Conflict(message) => (StatusCode::CONFLICT, "CONFLICT", message),
            Self::Repository(repository) => {
                error!(
                    event_name = "api.persistence.failed",
                    correlation_id = %correlation_id,
                    error = %repository,
                    "repository call failed"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "The service is temporarily unavailable".to_owned(),
                )
            }
            Self::Application(application) => {
                let interface = application.into_interface(correlation_id.clone());
                let (status, code) = match &interface {
                    InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                    InterfaceError::Unauthorized { .. } => {
                        (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
                    }
                    InterfaceError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                    InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    InterfaceError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
                    InterfaceError::ServiceUnavailable { .. } => {
                        (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
                    }
                    InterfaceError::Internal { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, code, interface.message().to_owned())
            }
        };

        (status, Json(ErrorBody { error: message, code: code.to_owned() })).into_response()
    }
}
