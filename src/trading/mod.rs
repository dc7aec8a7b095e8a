//! Trading module - provider fallback, signing and submission
//!
//! Aggregators, in default priority order:
//! - Jupiter (quote + swap)
//! - Raydium trade API (compute + transaction)
//! - OKX DEX aggregator (signed requests, needs API keys)

pub mod broadcast;
pub mod chain;
pub mod executor;
pub mod http;
pub mod jupiter;
pub mod okx;
pub mod provider;
pub mod raydium;
pub mod retry;
pub mod transaction;

#[cfg(test)]
pub mod testing;

pub use broadcast::{Broadcaster, RpcBroadcaster};
pub use chain::{ProviderChain, Resolution};
pub use executor::{FailureStage, SwapExecutor, SwapFailure, SwapResult};
pub use provider::{hedge_amount, SwapMode, SwapProvider, SwapRequest, UnsignedTransaction};
pub use retry::RetryPolicy;
