//! Transaction broadcast over an identity's transport
//!
//! Sends `sendTransaction` JSON-RPC requests through the reqwest client the
//! caller passes in, so submission follows the same network path as the
//! identity's quotes.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::UiTransactionEncoding;
use tracing::debug;

use crate::config::SubmissionConfig;
use crate::error::{Error, Result};

use super::http::is_transient_status;
use super::transaction::encode_base64;

/// Ledger submission boundary
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Submit a signed transaction, returning its signature
    async fn send(&self, transaction: &VersionedTransaction, transport: &Client)
        -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// JSON-RPC broadcaster for a Solana RPC endpoint
pub struct RpcBroadcaster {
    endpoint: String,
    send_config: RpcSendTransactionConfig,
}

impl RpcBroadcaster {
    pub fn new(endpoint: impl Into<String>, config: &SubmissionConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            send_config: RpcSendTransactionConfig {
                skip_preflight: config.skip_preflight,
                encoding: Some(UiTransactionEncoding::Base64),
                max_retries: Some(config.rpc_max_retries),
                ..Default::default()
            },
        }
    }

    fn request_body(&self, encoded: &str) -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendTransaction",
            "params": [encoded, self.send_config],
        })
    }
}

/// Turn an RPC response into a signature
fn parse_response(response: RpcResponse) -> Result<String> {
    if let Some(error) = response.error {
        return Err(Error::RpcRejected(format!("{} ({})", error.message, error.code)));
    }
    response
        .result
        .ok_or_else(|| Error::Deserialization("sendTransaction returned no result".to_string()))
}

#[async_trait]
impl Broadcaster for RpcBroadcaster {
    async fn send(&self, transaction: &VersionedTransaction, transport: &Client) -> Result<String> {
        let encoded = encode_base64(transaction)?;

        let response = transport
            .post(&self.endpoint)
            .json(&self.request_body(&encoded))
            .send()
            .await?;

        let status = response.status();
        if is_transient_status(status) {
            return Err(Error::Network(format!("RPC returned HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(Error::RpcRejected(format!("HTTP {}", status)));
        }

        let body: RpcResponse = response.json().await?;
        let signature = parse_response(body)?;
        debug!("RPC accepted transaction {}", signature);
        Ok(signature)
    }
}
