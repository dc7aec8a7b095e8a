//! Jupiter aggregator provider
//!
//! Two calls per swap:
//! - `GET /quote` prices a route
//! - `POST /swap` turns the route into a base64 unsigned transaction

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::JupiterConfig;
use crate::error::Result;

use super::http::{read_json, Stage};
use super::provider::{QuoteParams, SwapProvider, UnsignedTransaction};

const NAME: &str = "jupiter";

/// Swap request body for `/swap`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapBody<'a> {
    quote_response: &'a Value,
    user_public_key: &'a str,
    wrap_and_unwrap_sol: bool,
    dynamic_compute_unit_limit: bool,
    prioritization_fee_lamports: &'static str,
}

/// Response from `/swap`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: Option<String>,
    error: Option<String>,
}

/// Jupiter provider, always available
pub struct JupiterProvider {
    base_url: String,
    slippage_bps: u32,
}

impl JupiterProvider {
    pub fn new(config: &JupiterConfig, slippage_bps: u32) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            slippage_bps,
        }
    }

    async fn quote(&self, params: &QuoteParams<'_>, transport: &Client) -> Result<Value> {
        let amount = params.amount.to_string();
        let slippage = self.slippage_bps.to_string();

        let response = transport
            .get(format!("{}/quote", self.base_url))
            .query(&[
                ("inputMint", params.input_mint),
                ("outputMint", params.output_mint),
                ("amount", amount.as_str()),
                ("slippageBps", slippage.as_str()),
                ("swapMode", params.mode.as_str()),
                ("restrictIntermediateTokens", "true"),
            ])
            .send()
            .await?;

        let quote: Value = read_json(NAME, Stage::Quote, response).await?;
        check_quote(&quote)?;
        Ok(quote)
    }

    async fn build(&self, quote: &Value, signer: &str, transport: &Client) -> Result<UnsignedTransaction> {
        let body = SwapBody {
            quote_response: quote,
            user_public_key: signer,
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
            prioritization_fee_lamports: "auto",
        };

        let response = transport
            .post(format!("{}/swap", self.base_url))
            .json(&body)
            .send()
            .await?;

        let swap: SwapResponse = read_json(NAME, Stage::Build, response).await?;
        extract_transaction(swap)
    }
}

/// Reject quotes that carry an error or lack a route
fn check_quote(quote: &Value) -> Result<()> {
    if let Some(error) = quote.get("error").and_then(Value::as_str) {
        return Err(Stage::Quote.error(NAME, error));
    }
    if quote.get("outAmount").is_none() || quote.get("routePlan").is_none() {
        return Err(Stage::Quote.error(NAME, "quote missing outAmount/routePlan"));
    }
    Ok(())
}

/// String amount from a quote, `?` when absent
fn amount_field<'a>(quote: &'a Value, key: &str) -> &'a str {
    quote.get(key).and_then(Value::as_str).unwrap_or("?")
}

fn extract_transaction(swap: SwapResponse) -> Result<UnsignedTransaction> {
    if let Some(error) = swap.error {
        return Err(Stage::Build.error(NAME, error));
    }
    let encoded = swap
        .swap_transaction
        .ok_or_else(|| Stage::Build.error(NAME, "no swapTransaction in response"))?;
    UnsignedTransaction::from_base64(NAME, &encoded)
}

#[async_trait]
impl SwapProvider for JupiterProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn quote_and_build(
        &self,
        params: &QuoteParams<'_>,
        transport: &Client,
    ) -> Result<UnsignedTransaction> {
        let quote = self.quote(params, transport).await?;
        let in_amount = amount_field(&quote, "inAmount");
        let out_amount = amount_field(&quote, "outAmount");
        debug!(
            "Jupiter quote {} -> {}: in={} out={}",
            params.input_mint, params.output_mint, in_amount, out_amount
        );
        self.build(&quote, &params.signer, transport).await
    }
}
