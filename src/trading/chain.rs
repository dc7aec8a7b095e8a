//! Provider fallback chain
//!
//! Providers are tried in the configured order. Unavailable providers are
//! never called. Each provider gets its own retry budget for transient errors;
//! once the chain moves past a provider it is not called again for the same
//! request.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Config, ProviderKind};
use crate::error::{Error, FailureLog, ProviderFailure, Result};

use super::jupiter::JupiterProvider;
use super::okx::OkxProvider;
use super::provider::{SwapProvider, SwapRequest, UnsignedTransaction};
use super::raydium::RaydiumProvider;
use super::retry::RetryPolicy;

/// A resolved swap: the transaction plus how we got it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub transaction: UnsignedTransaction,
    pub provider: String,
    /// Providers that failed before `provider` succeeded, in order
    pub failures: FailureLog,
}

pub struct ProviderChain {
    providers: Vec<Arc<dyn SwapProvider>>,
    retry: RetryPolicy,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn SwapProvider>>, retry: RetryPolicy) -> Self {
        Self { providers, retry }
    }

    /// Build the chain in `providers.order`
    pub fn from_config(config: &Config) -> Self {
        let slippage = config.providers.slippage_bps;
        let providers = config
            .providers
            .order
            .iter()
            .map(|kind| -> Arc<dyn SwapProvider> {
                match kind {
                    ProviderKind::Jupiter => {
                        Arc::new(JupiterProvider::new(&config.providers.jupiter, slippage))
                    }
                    ProviderKind::Raydium => {
                        Arc::new(RaydiumProvider::new(&config.providers.raydium, slippage))
                    }
                    ProviderKind::Okx => Arc::new(OkxProvider::new(&config.providers.okx, slippage)),
                }
            })
            .collect();

        Self::new(providers, RetryPolicy::from_config(&config.retry))
    }

    /// Names of all providers, in priority order
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Names of providers that will actually be called
    pub fn available(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name())
            .collect()
    }

    pub fn log_status(&self) {
        for provider in &self.providers {
            if provider.is_available() {
                info!("Provider {}: available", provider.name());
            } else {
                warn!("Provider {}: unavailable (not configured)", provider.name());
            }
        }
    }

    /// Resolve a request to an unsigned transaction
    ///
    /// Fails with [`Error::AllProvidersExhausted`] carrying every failure when
    /// no provider succeeds.
    pub async fn resolve(&self, request: &SwapRequest) -> Result<Resolution> {
        let params = request.params();
        let transport = request.identity().transport();
        let mut failures = Vec::new();

        for provider in self.providers.iter().filter(|p| p.is_available()) {
            let name = provider.name();
            debug!(
                "[{}] trying {} for {} {} -> {}",
                request.identity().label(),
                name,
                request.amount(),
                request.input_mint(),
                request.output_mint()
            );

            let outcome = self
                .retry
                .run(name, || provider.quote_and_build(&params, transport))
                .await;

            match outcome.result {
                Ok(transaction) => {
                    return Ok(Resolution {
                        transaction,
                        provider: name.to_string(),
                        failures: FailureLog(failures),
                    });
                }
                Err(e) => {
                    warn!(
                        "[{}] {} failed after {} attempt(s): {}",
                        request.identity().label(),
                        name,
                        outcome.attempts,
                        e
                    );
                    failures.push(ProviderFailure::new(name, &e, outcome.attempts));
                }
            }
        }

        Err(Error::AllProvidersExhausted(FailureLog(failures)))
    }
}
