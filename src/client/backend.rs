//! Server transport seam for the sync client.
//!
//! `HttpBackend` talks to the live API over reqwest with a cookie store, so
//! the session cookie rides along automatically. Tests substitute their own
//! implementation.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::client::error::ClientError;
use crate::models::wire::{
    DeleteAccountRequest, ErrorBody, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, SessionRecoveryResponse, SyncRequest, SyncResponse,
};

#[async_trait]
pub trait Backend: Send + Sync {
    async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, ClientError>;
    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ClientError>;
    async fn sync(&self, request: SyncRequest) -> Result<SyncResponse, ClientError>;
    async fn delete_account(&self, request: DeleteAccountRequest) -> Result<(), ClientError>;
    async fn fetch_session(&self) -> Result<SessionRecoveryResponse, ClientError>;
}

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/personalization{}", self.base_url, path)
    }
}

/// Maps an HTTP status to the client taxonomy. 404 on login becomes the same
/// undifferentiated `Authentication` error as a failed decrypt.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());

    Err(match status {
        StatusCode::BAD_REQUEST => ClientError::Validation(message),
        StatusCode::UNAUTHORIZED => ClientError::SessionExpired,
        StatusCode::NOT_FOUND => ClientError::Authentication,
        StatusCode::CONFLICT => ClientError::UsernameTaken,
        _ => ClientError::Network(message),
    })
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Network(err.to_string())
}

#[async_trait]
impl Backend for HttpBackend {
    async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/register"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        check(response).await?.json().await.map_err(transport)
    }

    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/login"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        check(response).await?.json().await.map_err(transport)
    }

    async fn sync(&self, request: SyncRequest) -> Result<SyncResponse, ClientError> {
        let response = self
            .http
            .put(self.url("/sync"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        check(response).await?.json().await.map_err(transport)
    }

    async fn delete_account(&self, request: DeleteAccountRequest) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url("/account"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        check(response).await?;
        Ok(())
    }

    async fn fetch_session(&self) -> Result<SessionRecoveryResponse, ClientError> {
        let response = self
            .http
            .get(self.url("/session"))
            .send()
            .await
            .map_err(transport)?;

        check(response).await?.json().await.map_err(transport)
    }
}
