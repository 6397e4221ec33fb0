//! Wallet-signer client for on-chain mirroring
//!
//! Mirroring a BUY/SELL decision as a chain transfer is best-effort:
//! failures here are logged to the on-chain ring and never feed back into
//! trading correctness.

use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("transfer rejected by user")]
    Rejected,
    #[error("insufficient funds for transfer")]
    InsufficientFunds,
    #[error("transfer failed: {0}")]
    Other(String),
}

impl SignerError {
    /// The signer endpoint surfaces wallet errors as free text; classify
    /// the common cases so the on-chain log can name them.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("reject") || lower.contains("denied") {
            SignerError::Rejected
        } else if lower.contains("insufficient") || lower.contains("balance") {
            SignerError::InsufficientFunds
        } else {
            SignerError::Other(message.to_string())
        }
    }
}

/// One transfer request: fixed amount to the side-specific destination.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub action: String,
    pub to: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl TransferRequest {
    pub fn new(action: String, to: String, amount: Decimal, from: Option<String>) -> Self {
        Self {
            action,
            to,
            amount: amount.to_f64().unwrap_or(0.0),
            from,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxReceipt {
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    #[serde(rename = "explorerUrl")]
    pub explorer_url: String,
    pub amount: f64,
    pub to: String,
}

#[derive(Debug, Deserialize)]
struct SignerErrorResponse {
    error: Option<String>,
}

/// Seam between the dispatcher and the wallet signer.
pub trait TransferSigner: Send + Sync + 'static {
    fn send_transfer(
        &self,
        request: TransferRequest,
    ) -> impl Future<Output = Result<TxReceipt, SignerError>> + Send;
}

/// HTTP client for the signer endpoint
pub struct ChainClient {
    client: Client,
    base_url: String,
}

impl ChainClient {
    pub fn new(base_url: &str) -> Result<Self, SignerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SignerError::Other(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl TransferSigner for ChainClient {
    async fn send_transfer(&self, request: TransferRequest) -> Result<TxReceipt, SignerError> {
        let url = format!("{}/trade", self.base_url);
        debug!(action = %request.action, to = %request.to, amount = request.amount, "sending on-chain transfer");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SignerError::Other(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<SignerErrorResponse>().await {
                Ok(body) => body.error.unwrap_or_else(|| status.to_string()),
                Err(_) => status.to_string(),
            };
            return Err(SignerError::classify(&message));
        }

        response
            .json::<TxReceipt>()
            .await
            .map_err(|e| SignerError::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_signer_errors() {
        assert!(matches!(
            SignerError::classify("User rejected the request"),
            SignerError::Rejected
        ));
        assert!(matches!(
            SignerError::classify("insufficient funds for gas"),
            SignerError::InsufficientFunds
        ));
        assert!(matches!(
            SignerError::classify("wrong chain id"),
            SignerError::Other(_)
        ));
    }
}
