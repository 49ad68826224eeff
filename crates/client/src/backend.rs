use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use reqflow_core::actions::ActionRequest;
use reqflow_core::domain::function::{FunctionFilter, RequestFunction};
use reqflow_core::domain::queue::QueueKind;
use reqflow_core::domain::request::{Request, RequestFields, RequestId};
use reqflow_core::errors::ApplicationError;
use reqflow_core::wire::LoginResponse;

/// Failure talking to the backend of record.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("not authenticated: {0}")]
    Unauthorized(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Short label used in telemetry fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Unauthorized(_) => "unauthorized",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<BackendError> for ApplicationError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Unauthorized(message) => Self::Unauthenticated(message),
            BackendError::Status { status: 403, message } => Self::Forbidden(message),
            BackendError::Status { status: 404, message } => Self::NotFound(message),
            other => Self::Integration(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: SecretString::from(password.into()) }
    }
}

/// The backend of record. Every state change goes through it; the client never
/// computes a next status itself.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BackendError>;
    async fn logout(&self) -> Result<(), BackendError>;
    async fn list(
        &self,
        queue: QueueKind,
        filter: FunctionFilter,
    ) -> Result<Vec<Request>, BackendError>;
    async fn submit_action(
        &self,
        queue: QueueKind,
        id: RequestId,
        action: &ActionRequest,
    ) -> Result<Request, BackendError>;
    async fn fetch_request(&self, id: RequestId) -> Result<Request, BackendError>;
    async fn replace_request(
        &self,
        id: RequestId,
        fields: &RequestFields,
    ) -> Result<Request, BackendError>;
    async fn create_request(
        &self,
        function: RequestFunction,
        fields: &RequestFields,
    ) -> Result<Request, BackendError>;
}

#[async_trait]
impl<B> Backend for Arc<B>
where
    B: Backend + ?Sized,
{
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BackendError> {
        (**self).login(credentials).await
    }

    async fn logout(&self) -> Result<(), BackendError> {
        (**self).logout().await
    }

    async fn list(
        &self,
        queue: QueueKind,
        filter: FunctionFilter,
    ) -> Result<Vec<Request>, BackendError> {
        (**self).list(queue, filter).await
    }

    async fn submit_action(
        &self,
        queue: QueueKind,
        id: RequestId,
        action: &ActionRequest,
    ) -> Result<Request, BackendError> {
        (**self).submit_action(queue, id, action).await
    }

    async fn fetch_request(&self, id: RequestId) -> Result<Request, BackendError> {
        (**self).fetch_request(id).await
    }

    async fn replace_request(
        &self,
        id: RequestId,
        fields: &RequestFields,
    ) -> Result<Request, BackendError> {
        (**self).replace_request(id, fields).await
    }

    async fn create_request(
        &self,
        function: RequestFunction,
        fields: &RequestFields,
    ) -> Result<Request, BackendError> {
        (**self).create_request(function, fields).await
    }
}
