//! Session-service (gym) API client

use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::{ActionRequest, CreateSessionRequest, StateResponse};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session not found or expired")]
    SessionNotFound,
    #[error("session create failed: {0}")]
    SessionCreate(String),
    #[error("state fetch failed: {0}")]
    StateFetch(String),
    #[error("action dispatch failed: {0}")]
    ActionDispatch(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Seam between the poll loop and the session service, so the loop can be
/// exercised against scripted responses in tests.
pub trait SessionService: Send + Sync + 'static {
    fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;

    /// `steps = 0` validates the session without advancing it.
    fn fetch_state(
        &self,
        session_id: &str,
        steps: u32,
    ) -> impl Future<Output = Result<StateResponse, ClientError>> + Send;

    fn submit_action(
        &self,
        session_id: &str,
        request: &ActionRequest,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// HTTP client for the gym session service
pub struct GymClient {
    client: Client,
    base_url: String,
}

impl GymClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct CreateSessionResponse {
    session_id: Option<String>,
    error: Option<String>,
}

impl SessionService for GymClient {
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<String, ClientError> {
        let url = format!("{}/session", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::SessionCreate(format!("{status} - {text}")));
        }

        let body: CreateSessionResponse = response.json().await?;
        match body.session_id {
            Some(id) => {
                debug!(session_id = %id, "session created");
                Ok(id)
            }
            None => Err(ClientError::SessionCreate(
                body.error.unwrap_or_else(|| "missing session_id".to_string()),
            )),
        }
    }

    async fn fetch_state(&self, session_id: &str, steps: u32) -> Result<StateResponse, ClientError> {
        let url = format!("{}/state/{}", self.base_url, session_id);

        let response = self
            .client
            .get(&url)
            .query(&[("steps", steps)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::SessionNotFound);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::StateFetch(format!("{status} - {text}")));
        }

        let state: StateResponse = response.json().await?;
        // The service reports unknown/expired ids in-band as an error field.
        if state.error.is_some() {
            return Err(ClientError::SessionNotFound);
        }
        Ok(state)
    }

    async fn submit_action(
        &self,
        session_id: &str,
        request: &ActionRequest,
    ) -> Result<(), ClientError> {
        let url = format!("{}/action/{}", self.base_url, session_id);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::ActionDispatch(format!("{status} - {text}")));
        }
        debug!(session_id, action = %request.action, "action submitted");
        Ok(())
    }
}
