//! Ledger client
//!
//! Read-only view of recent transactions touching an address, served by the
//! public Kaspa REST API.

use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::LedgerError;
use crate::config::ConfirmationConfig;

/// One transaction as returned by `full-transactions`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerTransaction {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub is_accepted: bool,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub outputs: Vec<LedgerOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerOutput {
    #[serde(default)]
    pub script_public_key_address: String,
    /// Smallest units (sompi)
    pub amount: u64,
}

/// Source of recent transactions for an address
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn recent_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<LedgerTransaction>, LedgerError>;
}

/// Kaspa REST API client with bounded retry
pub struct KaspaRestClient {
    base_url: String,
    client: reqwest::Client,
    page_size: u32,
    attempts: u32,
    backoff: Duration,
}

impl KaspaRestClient {
    pub fn new(base_url: &str, config: &ConfirmationConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| LedgerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            page_size: config.page_size,
            attempts: config.transport_attempts.max(1),
            backoff: config.transport_backoff(),
        })
    }

    fn transactions_url(&self, address: &str) -> String {
        format!(
            "{}/addresses/{}/full-transactions?limit={}&resolve_previous_outpoints=light",
            self.base_url, address, self.page_size
        )
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LedgerClient for KaspaRestClient {
    async fn recent_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let url = self.transactions_url(address);
        let url = url.as_str();
        let txs = with_retry(self.attempts, self.backoff, move || self.fetch_once(url)).await?;
        debug!(address, count = txs.len(), "Fetched recent transactions");
        Ok(txs)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `attempts` calls were made. The delay doubles after every retry.
pub(crate) async fn with_retry<T, F, Fut>(
    attempts: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let attempts = attempts.max(1);
    let mut delay = backoff;
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Ledger request failed, retrying in {:?}", delay
                );
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
