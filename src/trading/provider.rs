//! Swap provider capability and request types

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use solana_sdk::transaction::VersionedTransaction;

use crate::error::{Error, Result};
use crate::wallet::Identity;

/// Hedge leg keeps 99.5% of the forward amount (fee/slippage absorption)
pub const HEDGE_NUMERATOR: u64 = 995;
pub const HEDGE_DENOMINATOR: u64 = 1000;

/// Hedge amount for a forward amount, rounded down
pub fn hedge_amount(forward: u64) -> u64 {
    (forward as u128 * HEDGE_NUMERATOR as u128 / HEDGE_DENOMINATOR as u128) as u64
}

/// Which side of the swap `amount` fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapMode {
    /// Spend exactly `amount` of the input asset
    ExactIn,
    /// Receive exactly `amount` of the output asset
    ExactOut,
}

impl SwapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapMode::ExactIn => "ExactIn",
            SwapMode::ExactOut => "ExactOut",
        }
    }
}

/// One swap to perform under one identity
#[derive(Debug, Clone)]
pub struct SwapRequest {
    input_mint: String,
    output_mint: String,
    amount: u64,
    mode: SwapMode,
    identity: Arc<Identity>,
}

impl SwapRequest {
    /// Forward leg: spend `amount` base units of `input_mint`
    pub fn forward(
        input_mint: impl Into<String>,
        output_mint: impl Into<String>,
        amount: u64,
        identity: Arc<Identity>,
    ) -> Self {
        Self {
            input_mint: input_mint.into(),
            output_mint: output_mint.into(),
            amount,
            mode: SwapMode::ExactIn,
            identity,
        }
    }

    /// Reverse leg of a forward swap
    ///
    /// Mints are swapped and the amount is 0.995 x the forward amount, still
    /// denominated in the forward input asset, so the hedge asks for that much
    /// of it back.
    pub fn hedge_of(forward: &SwapRequest) -> Self {
        Self {
            input_mint: forward.output_mint.clone(),
            output_mint: forward.input_mint.clone(),
            amount: hedge_amount(forward.amount),
            mode: SwapMode::ExactOut,
            identity: forward.identity.clone(),
        }
    }

    pub fn input_mint(&self) -> &str {
        &self.input_mint
    }

    pub fn output_mint(&self) -> &str {
        &self.output_mint
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn mode(&self) -> SwapMode {
        self.mode
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    /// Provider-facing view of this request
    pub fn params(&self) -> QuoteParams<'_> {
        QuoteParams {
            input_mint: &self.input_mint,
            output_mint: &self.output_mint,
            amount: self.amount,
            mode: self.mode,
            signer: self.identity.pubkey().to_string(),
        }
    }
}

/// What a provider needs to quote and build a swap
#[derive(Debug, Clone)]
pub struct QuoteParams<'a> {
    pub input_mint: &'a str,
    pub output_mint: &'a str,
    pub amount: u64,
    pub mode: SwapMode,
    /// Base58 address of the signing wallet
    pub signer: String,
}

/// Serialized transaction returned by an aggregator, not yet signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    bytes: Vec<u8>,
}

impl UnsignedTransaction {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Decode a base64 payload
    pub fn from_base64(provider: &str, encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::ProviderBuild {
                provider: provider.to_string(),
                reason: format!("invalid base64 transaction: {}", e),
            })?;
        Ok(Self { bytes })
    }

    /// Decode a base58 payload
    pub fn from_base58(provider: &str, encoded: &str) -> Result<Self> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| Error::ProviderBuild {
                provider: provider.to_string(),
                reason: format!("invalid base58 transaction: {}", e),
            })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Deserialize into a versioned transaction
    pub fn decode(&self) -> Result<VersionedTransaction> {
        bincode::deserialize(&self.bytes)
            .map_err(|e| Error::Deserialization(format!("Failed to decode transaction: {}", e)))
    }
}

/// An external swap-aggregation service
///
/// Providers are stateless with respect to requests. Availability is decided
/// at construction and never changes.
#[async_trait]
pub trait SwapProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Whether the provider is configured well enough to be called
    fn is_available(&self) -> bool;

    /// Quote the swap and build an unsigned transaction for `params.signer`,
    /// sending every request through `transport`
    async fn quote_and_build(
        &self,
        params: &QuoteParams<'_>,
        transport: &reqwest::Client,
    ) -> Result<UnsignedTransaction>;
}
