//! OKX DEX aggregator provider
//!
//! Every request is signed:
//! `OK-ACCESS-SIGN = base64(HMAC-SHA256(secret, timestamp + method + path + body))`
//! where `path` includes the query string. Without key, secret and passphrase
//! the provider reports itself unavailable.

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use crate::config::{OkxConfig, WSOL_MINT};
use crate::error::{Error, Result};

use super::http::{read_json, Stage};
use super::provider::{QuoteParams, SwapMode, SwapProvider, UnsignedTransaction};

const NAME: &str = "okx";

/// OKX chain index for Solana
const SOLANA_CHAIN_INDEX: &str = "501";

/// OKX's address for native SOL
const NATIVE_SOL: &str = "11111111111111111111111111111111";

const QUOTE_PATH: &str = "/api/v5/dex/aggregator/quote";
const SWAP_PATH: &str = "/api/v5/dex/aggregator/swap";

/// Response codes that mean "try again later"
const TRANSIENT_CODES: &[&str] = &["50001", "50011", "50013"];

/// OKX response envelope
#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Value>,
}

/// OKX DEX provider
pub struct OkxProvider {
    config: OkxConfig,
    base_url: String,
    slippage_bps: u32,
}

impl OkxProvider {
    pub fn new(config: &OkxConfig, slippage_bps: u32) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
            slippage_bps,
        }
    }

    /// Signed GET of `path?query`, returning the first `data` entry
    async fn signed_get(
        &self,
        stage: Stage,
        path: &str,
        query: &[(&str, &str)],
        transport: &Client,
    ) -> Result<Value> {
        let request_path = format!("{}?{}", path, encode_query(query));
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let signature = sign_request(&self.config.secret_key, &timestamp, "GET", &request_path, "")?;

        let mut request = transport
            .get(format!("{}{}", self.base_url, request_path))
            .header("OK-ACCESS-KEY", &self.config.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", &timestamp)
            .header("OK-ACCESS-PASSPHRASE", &self.config.passphrase);
        if !self.config.project_id.is_empty() {
            request = request.header("OK-ACCESS-PROJECT", &self.config.project_id);
        }

        let response = request.send().await?;
        let envelope: Envelope = read_json(NAME, stage, response).await?;
        first_entry(stage, envelope)
    }
}

/// Sign an OKX request
pub fn sign_request(
    secret: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Internal(format!("HMAC key rejected: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

fn encode_query(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// OKX names native SOL by the system program address
fn okx_token(mint: &str) -> &str {
    if mint == WSOL_MINT {
        NATIVE_SOL
    } else {
        mint
    }
}

fn first_entry(stage: Stage, envelope: Envelope) -> Result<Value> {
    if envelope.code != "0" {
        if TRANSIENT_CODES.contains(&envelope.code.as_str()) {
            return Err(Error::Network(format!(
                "okx code {}: {}",
                envelope.code, envelope.msg
            )));
        }
        return Err(stage.error(NAME, format!("code {}: {}", envelope.code, envelope.msg)));
    }
    envelope
        .data
        .into_iter()
        .next()
        .ok_or_else(|| stage.error(NAME, "empty data in response"))
}

fn extract_transaction(swap: &Value) -> Result<UnsignedTransaction> {
    let encoded = swap
        .get("tx")
        .and_then(|tx| tx.get("data"))
        .and_then(Value::as_str)
        .ok_or_else(|| Stage::Build.error(NAME, "no tx.data in swap response"))?;
    // Solana payloads come back base58 encoded
    UnsignedTransaction::from_base58(NAME, encoded)
}

fn slippage_fraction(bps: u32) -> String {
    format!("{}", bps as f64 / 10_000.0)
}

#[async_trait]
impl SwapProvider for OkxProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.config.has_credentials()
    }

    async fn quote_and_build(
        &self,
        params: &QuoteParams<'_>,
        transport: &Client,
    ) -> Result<UnsignedTransaction> {
        if params.mode == SwapMode::ExactOut {
            return Err(Stage::Quote.error(NAME, "exact-out swaps are not supported"));
        }

        let amount = params.amount.to_string();
        let from = okx_token(params.input_mint);
        let to = okx_token(params.output_mint);

        let quote = self
            .signed_get(
                Stage::Quote,
                QUOTE_PATH,
                &[
                    ("chainIndex", SOLANA_CHAIN_INDEX),
                    ("amount", amount.as_str()),
                    ("fromTokenAddress", from),
                    ("toTokenAddress", to),
                ],
                transport,
            )
            .await?;
        let out_amount = quote
            .get("toTokenAmount")
            .and_then(Value::as_str)
            .ok_or_else(|| Stage::Quote.error(NAME, "quote missing toTokenAmount"))?;
        debug!("OKX quote {} -> {}: out={}", from, to, out_amount);

        let slippage = slippage_fraction(self.slippage_bps);
        let swap = self
            .signed_get(
                Stage::Build,
                SWAP_PATH,
                &[
                    ("chainIndex", SOLANA_CHAIN_INDEX),
                    ("amount", amount.as_str()),
                    ("fromTokenAddress", from),
                    ("toTokenAddress", to),
                    ("slippage", slippage.as_str()),
                    ("userWalletAddress", params.signer.as_str()),
                ],
                transport,
            )
            .await?;

        extract_transaction(&swap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(with_keys: bool) -> OkxConfig {
        OkxConfig {
            base_url: "https://web3.okx.com".into(),
            api_key: if with_keys { "key".into() } else { String::new() },
            secret_key: if with_keys { "secret".into() } else { String::new() },
            passphrase: if with_keys { "pass".into() } else { String::new() },
            project_id: String::new(),
        }
    }

    #[test]
    fn test_availability_follows_credentials() {
        assert!(OkxProvider::new(&config(true), 50).is_available());
        assert!(!OkxProvider::new(&config(false), 50).is_available());
    }

    #[test]
    fn test_signature_is_deterministic() {
        let ts = "2024-05-01T12:00:00.000Z";
        let a = sign_request("secret", ts, "GET", "/api/v5/dex/aggregator/quote?amount=1", "").unwrap();
        let b = sign_request("secret", ts, "GET", "/api/v5/dex/aggregator/quote?amount=1", "").unwrap();
        assert_eq!(a, b);
        // SHA-256 digest, base64 encoded
        assert_eq!(a.len(), 44);

        let other_path = sign_request("secret", ts, "GET", "/api/v5/dex/aggregator/quote?amount=2", "").unwrap();
        let other_key = sign_request("other", ts, "GET", "/api/v5/dex/aggregator/quote?amount=1", "").unwrap();
        assert_ne!(a, other_path);
        assert_ne!(a, other_key);
    }

    #[test]
    fn test_encode_query_preserves_order() {
        let q = encode_query(&[("chainIndex", "501"), ("amount", "10"), ("slippage", "0.005")]);
        assert_eq!(q, "chainIndex=501&amount=10&slippage=0.005");
    }

    #[test]
    fn test_wsol_maps_to_native() {
        assert_eq!(okx_token(WSOL_MINT), NATIVE_SOL);
        assert_eq!(okx_token("abc"), "abc");
    }

    #[test]
    fn test_envelope_codes() {
        let ok = Envelope {
            code: "0".into(),
            msg: String::new(),
            data: vec![json!({"toTokenAmount": "5"})],
        };
        assert!(first_entry(Stage::Quote, ok).is_ok());

        let limited = Envelope {
            code: "50011".into(),
            msg: "Too Many Requests".into(),
            data: vec![],
        };
        assert!(first_entry(Stage::Quote, limited).unwrap_err().is_retryable());

        let rejected = Envelope {
            code: "82000".into(),
            msg: "Insufficient liquidity".into(),
            data: vec![],
        };
        let err = first_entry(Stage::Quote, rejected).unwrap_err();
        assert!(matches!(err, Error::ProviderQuote { .. }));

        let empty = Envelope {
            code: "0".into(),
            msg: String::new(),
            data: vec![],
        };
        assert!(matches!(
            first_entry(Stage::Build, empty),
            Err(Error::ProviderBuild { .. })
        ));
    }

    #[test]
    fn test_extract_base58_transaction() {
        let swap = json!({"tx": {"data": bs58::encode([1u8, 2, 3]).into_string()}});
        assert_eq!(extract_transaction(&swap).unwrap().as_bytes(), &[1, 2, 3]);
        assert!(extract_transaction(&json!({"tx": {}})).is_err());
    }

    #[test]
    fn test_slippage_fraction() {
        assert_eq!(slippage_fraction(50), "0.005");
        assert_eq!(slippage_fraction(100), "0.01");
    }

    #[tokio::test]
    async fn test_exact_out_rejected_without_network() {
        let provider = OkxProvider::new(&config(true), 50);
        let params = QuoteParams {
            input_mint: "a",
            output_mint: "b",
            amount: 1,
            mode: SwapMode::ExactOut,
            signer: "w".into(),
        };
        let err = provider
            .quote_and_build(&params, &Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderQuote { .. }));
    }
}
