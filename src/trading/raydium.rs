//! Raydium trade API provider
//!
//! API Documentation: https://docs.raydium.io/raydium/traders/trade-api
//!
//! `swap-base-in` fixes the input amount, `swap-base-out` the output amount.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::config::{RaydiumConfig, WSOL_MINT};
use crate::error::{Error, Result};

use super::http::{read_json, Stage};
use super::provider::{QuoteParams, SwapMode, SwapProvider, UnsignedTransaction};

const NAME: &str = "raydium";
const TX_VERSION: &str = "V0";

/// Compute (quote) response
#[derive(Debug, Clone, Deserialize)]
struct ComputeResponse {
    success: bool,
    #[serde(default)]
    msg: Option<String>,
}

/// Transaction build request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildBody<'a> {
    compute_unit_price_micro_lamports: String,
    swap_response: &'a Value,
    tx_version: &'static str,
    wallet: &'a str,
    wrap_sol: bool,
    unwrap_sol: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_account: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct BuildResponse {
    success: bool,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<BuiltTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
struct BuiltTransaction {
    transaction: String,
}

/// Raydium provider, available when enabled in config
pub struct RaydiumProvider {
    base_url: String,
    slippage_bps: u32,
    compute_unit_price: u64,
    enabled: bool,
}

impl RaydiumProvider {
    pub fn new(config: &RaydiumConfig, slippage_bps: u32) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            slippage_bps,
            compute_unit_price: config.compute_unit_price_micro_lamports,
            enabled: config.enabled,
        }
    }

    async fn quote(&self, params: &QuoteParams<'_>, transport: &Client) -> Result<Value> {
        let amount = params.amount.to_string();
        let slippage = self.slippage_bps.to_string();

        let response = transport
            .get(format!("{}/compute/{}", self.base_url, route_suffix(params.mode)))
            .query(&[
                ("inputMint", params.input_mint),
                ("outputMint", params.output_mint),
                ("amount", amount.as_str()),
                ("slippageBps", slippage.as_str()),
                ("txVersion", TX_VERSION),
            ])
            .send()
            .await?;

        let quote: Value = read_json(NAME, Stage::Quote, response).await?;
        let compute: ComputeResponse = serde_json::from_value(quote.clone())
            .map_err(|e| Stage::Quote.error(NAME, format!("malformed compute response: {}", e)))?;
        if !compute.success {
            return Err(Stage::Quote.error(
                NAME,
                compute.msg.unwrap_or_else(|| "compute rejected".to_string()),
            ));
        }
        Ok(quote)
    }

    async fn build(
        &self,
        quote: &Value,
        params: &QuoteParams<'_>,
        transport: &Client,
    ) -> Result<UnsignedTransaction> {
        let body = build_body(quote, params, self.compute_unit_price)?;

        let response = transport
            .post(format!(
                "{}/transaction/{}",
                self.base_url,
                route_suffix(params.mode)
            ))
            .json(&body)
            .send()
            .await?;

        let built: BuildResponse = read_json(NAME, Stage::Build, response).await?;
        extract_transaction(built)
    }
}

fn route_suffix(mode: SwapMode) -> &'static str {
    match mode {
        SwapMode::ExactIn => "swap-base-in",
        SwapMode::ExactOut => "swap-base-out",
    }
}

fn build_body<'a>(
    quote: &'a Value,
    params: &'a QuoteParams<'_>,
    compute_unit_price: u64,
) -> Result<BuildBody<'a>> {
    let wrap_sol = params.input_mint == WSOL_MINT;
    let unwrap_sol = params.output_mint == WSOL_MINT;

    // SPL inputs are spent from the wallet's associated token account
    let input_account = if wrap_sol {
        None
    } else {
        let wallet = Pubkey::from_str(&params.signer)
            .map_err(|e| Error::Internal(format!("Invalid signer address: {}", e)))?;
        let mint = Pubkey::from_str(params.input_mint)
            .map_err(|e| Stage::Build.error(NAME, format!("invalid input mint: {}", e)))?;
        Some(spl_associated_token_account::get_associated_token_address(&wallet, &mint).to_string())
    };

    Ok(BuildBody {
        compute_unit_price_micro_lamports: compute_unit_price.to_string(),
        swap_response: quote,
        tx_version: TX_VERSION,
        wallet: &params.signer,
        wrap_sol,
        unwrap_sol,
        input_account,
    })
}

fn extract_transaction(built: BuildResponse) -> Result<UnsignedTransaction> {
    if !built.success {
        return Err(Stage::Build.error(
            NAME,
            built.msg.unwrap_or_else(|| "build rejected".to_string()),
        ));
    }
    match built.data.as_slice() {
        [only] => UnsignedTransaction::from_base64(NAME, &only.transaction),
        [] => Err(Stage::Build.error(NAME, "no transaction in response")),
        many => Err(Stage::Build.error(
            NAME,
            format!("route needs {} transactions, expected 1", many.len()),
        )),
    }
}

#[async_trait]
impl SwapProvider for RaydiumProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    async fn quote_and_build(
        &self,
        params: &QuoteParams<'_>,
        transport: &Client,
    ) -> Result<UnsignedTransaction> {
        let quote = self.quote(params, transport).await?;
        debug!(
            "Raydium quote {} -> {} ({}) ok",
            params.input_mint,
            params.output_mint,
            params.mode.as_str()
        );
        self.build(&quote, params, transport).await
    }
}
