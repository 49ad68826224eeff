use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use reqflow_core::actions::ActionRequest;
use reqflow_core::config::BackendConfig;
use reqflow_core::domain::function::{FunctionFilter, RequestFunction};
use reqflow_core::domain::queue::QueueKind;
use reqflow_core::domain::request::{Request, RequestFields, RequestId};
use reqflow_core::wire::{
    CreateRequestBody, ErrorBody, LoginBody, LoginResponse, ReplaceFieldsBody,
};

use crate::backend::{Backend, BackendError, Credentials};

/// REST backend reached over HTTP. Attaches the bearer token to every call.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| BackendError::Transport(error.to_string()))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned(), token: None })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let backend = Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
        Ok(match &config.api_token {
            Some(token) => backend.with_token(token.clone()),
            None => backend,
        })
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|error| BackendError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        debug!(status = status.as_u16(), message = %message, "backend returned error status");
        if status == StatusCode::UNAUTHORIZED {
            Err(BackendError::Unauthorized(message))
        } else {
            Err(BackendError::Status { status: status.as_u16(), message })
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, BackendError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|error| BackendError::Decode(error.to_string()))
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(error) => error.error,
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body,
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BackendError> {
        let body = LoginBody {
            email: credentials.email.clone(),
            password: credentials.password.expose_secret().to_owned(),
        };
        self.send_json(self.client.post(self.url("/login/")).json(&body)).await
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.send(self.client.post(self.url("/logout/"))).await.map(|_| ())
    }

    async fn list(
        &self,
        queue: QueueKind,
        filter: FunctionFilter,
    ) -> Result<Vec<Request>, BackendError> {
        let mut builder = self.client.get(self.url(queue.path()));
        if let Some(function) = filter.query_value() {
            builder = builder.query(&[("function", function)]);
        }
        self.send_json(builder).await
    }

    async fn submit_action(
        &self,
        queue: QueueKind,
        id: RequestId,
        action: &ActionRequest,
    ) -> Result<Request, BackendError> {
        let path = queue.action_path(id).ok_or_else(|| BackendError::Status {
            status: StatusCode::METHOD_NOT_ALLOWED.as_u16(),
            message: format!("{queue} is a read-only view"),
        })?;
        self.send_json(self.client.post(self.url(&path)).json(action)).await
    }

    async fn fetch_request(&self, id: RequestId) -> Result<Request, BackendError> {
        self.send_json(self.client.get(self.url(&format!("/api/requests/{id}/")))).await
    }

    async fn replace_request(
        &self,
        id: RequestId,
        fields: &RequestFields,
    ) -> Result<Request, BackendError> {
        let body = ReplaceFieldsBody { fields: fields.clone() };
        self.send_json(self.client.put(self.url(&format!("/api/requests/{id}/"))).json(&body))
            .await
    }

    async fn create_request(
        &self,
        function: RequestFunction,
        fields: &RequestFields,
    ) -> Result<Request, BackendError> {
        let body = CreateRequestBody { function, fields: fields.clone() };
        self.send_json(self.client.post(self.url("/api/create-requests/")).json(&body)).await
    }
}
