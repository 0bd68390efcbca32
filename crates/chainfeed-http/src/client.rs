//! Ledger REST client backed by `reqwest`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use chainfeed_core::types::{Balance, BlockchainInfo, PeerList, SubmitReceipt};
use chainfeed_core::FeedError;

/// Configuration for `LedgerApiClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// API root, e.g. "http://localhost:8080/api/v1"
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".into(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Client for the node's `/api/v1` endpoints.
#[derive(Debug, Clone)]
pub struct LedgerApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl LedgerApiClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FeedError::Http(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Create with default timeout for `base_url`.
    pub fn default_for(base_url: impl Into<String>) -> Result<Self, FeedError> {
        Self::new(HttpClientConfig {
            base_url: base_url.into(),
            ..HttpClientConfig::default()
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /info`
    pub async fn blockchain_info(&self) -> Result<BlockchainInfo, FeedError> {
        self.get("/info", &[]).await
    }

    /// `GET /block?index=N`
    pub async fn block(&self, index: u64) -> Result<Value, FeedError> {
        self.get("/block", &[("index", index.to_string())]).await
    }

    /// `GET /transaction?txid=ID`
    pub async fn transaction(&self, txid: &str) -> Result<Value, FeedError> {
        self.get("/transaction", &[("txid", txid.to_string())]).await
    }

    /// `GET /balance?address=A`
    pub async fn balance(&self, address: &str) -> Result<Balance, FeedError> {
        self.get("/balance", &[("address", address.to_string())]).await
    }

    /// `GET /peers`
    pub async fn peers(&self) -> Result<Vec<Value>, FeedError> {
        let list: PeerList = self.get("/peers", &[]).await?;
        Ok(list.into_vec())
    }

    /// `POST /send`
    pub async fn send_transaction<T: Serialize + ?Sized>(
        &self,
        tx: &T,
    ) -> Result<SubmitReceipt, FeedError> {
        let url = self.url("/send");
        tracing::debug!(url = %url, "POST");
        let result = self.http.post(&url).json(tx).send().await;
        self.read_json("/send", result).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "GET");
        let result = self.http.get(&url).query(query).send().await;
        self.read_json(path, result).await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        path: &str,
        result: reqwest::Result<reqwest::Response>,
    ) -> Result<T, FeedError> {
        let outcome = async {
            let resp = result.map_err(|e| FeedError::Http(e.to_string()))?;
            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(FeedError::Status { status, body });
            }
            let bytes = resp.bytes().await.map_err(|e| FeedError::Http(e.to_string()))?;
            serde_json::from_slice(&bytes).map_err(FeedError::Serialization)
        }
        .await;

        if let Err(e) = &outcome {
            tracing::warn!(path, error = %e, "ledger API request failed");
        }
        outcome
    }
}
