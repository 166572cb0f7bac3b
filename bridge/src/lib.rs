//! Thin JSON-RPC 2.0 proxy to an external chain node.
//!
//! Forwards requests verbatim with bearer-token authentication. Not part of
//! the sync core; the node only exposes it so operators can reach the
//! external chain through one endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("external node returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestBody {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<String>,
    pub id: u64,
}

impl RequestBody {
    pub fn new(method: &str) -> Self {
        RequestBody {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: Vec::new(),
            id: 0,
        }
    }
}

/// HTTP client for a single external chain node.
#[derive(Clone)]
pub struct BridgeClient {
    host: String,
    token: String,
    http: reqwest::Client,
}

impl BridgeClient {
    pub fn new(host: String, token: String) -> Self {
        BridgeClient {
            host,
            token,
            http: reqwest::Client::new(),
        }
    }

    /// Look up a transaction on the external chain by hash.
    pub async fn get_message(&self, tx_hash: &str) -> Result<serde_json::Value, BridgeError> {
        let mut body = RequestBody::new("Chain.GetMessage");
        body.params.push(tx_hash.to_string());
        self.post(&body).await
    }

    /// Forward a raw JSON-RPC request body untouched.
    pub async fn forward(&self, body: &serde_json::Value) -> Result<serde_json::Value, BridgeError> {
        self.post(body).await
    }

    async fn post<B: Serialize>(&self, body: &B) -> Result<serde_json::Value, BridgeError> {
        let response = self
            .http
            .post(&self.host)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BridgeError::Status(response.status()));
        }

        Ok(response.json().await?)
    }
}
