//! Decision-oracle client
//!
//! HTTP client for the language-model decision source. The oracle is
//! treated as an untrusted text generator; whatever comes back goes
//! through the decision validator before it is acted on.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Temperature fixed low: we want parseable JSON, not creativity.
const TEMPERATURE: f64 = 0.2;

/// Default timeout for decision requests (30 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle error: {0}")]
    Service(String),
    #[error("oracle returned empty content")]
    Empty,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// One decision request: rendered system prompt plus the JSON context.
#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f64,
}

impl OracleRequest {
    pub fn new(system: String, user: String, model: String, api_key: Option<String>) -> Self {
        Self {
            system,
            user,
            model,
            api_key,
            temperature: TEMPERATURE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OracleResponse {
    content: Option<String>,
    error: Option<String>,
}

/// Seam between the poll loop and the oracle endpoint.
pub trait DecisionOracle: Send + Sync + 'static {
    fn complete(
        &self,
        request: OracleRequest,
    ) -> impl Future<Output = Result<String, OracleError>> + Send;
}

/// HTTP client for the oracle relay endpoint
pub struct OracleClient {
    client: Client,
    url: String,
}

impl OracleClient {
    pub fn new(url: &str) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .pool_max_idle_per_host(2)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl DecisionOracle for OracleClient {
    async fn complete(&self, request: OracleRequest) -> Result<String, OracleError> {
        debug!(model = %request.model, "requesting decision from oracle");

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OracleError::Service(format!("{status} - {text}")));
        }

        let body: OracleResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(OracleError::Service(error));
        }
        match body.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(OracleError::Empty),
        }
    }
}
