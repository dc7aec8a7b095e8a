//! Swap execution: resolve, sign, submit
//!
//! The executor never touches session state. It reports an outcome and the
//! caller decides what a success counts for.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, FailureLog};

use super::broadcast::Broadcaster;
use super::chain::ProviderChain;
use super::provider::SwapRequest;
use super::retry::RetryPolicy;
use super::transaction::sign_transaction;

/// A confirmed submission
#[derive(Debug, Clone)]
pub struct SwapResult {
    pub signature: String,
    pub provider: String,
    /// Providers that failed first, in the order they were tried
    pub fallbacks: FailureLog,
}

/// Where a swap failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Resolve,
    Sign,
    Submit,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Resolve => "resolve",
            FailureStage::Sign => "sign",
            FailureStage::Submit => "submit",
        };
        write!(f, "{}", s)
    }
}

/// A failed swap, with every provider that was tried
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {error} (providers: {tried})")]
pub struct SwapFailure {
    pub stage: FailureStage,
    /// Provider whose transaction was being signed/submitted, if any
    pub provider: Option<String>,
    pub tried: FailureLog,
    pub error: Error,
}

pub struct SwapExecutor {
    chain: ProviderChain,
    broadcaster: Arc<dyn Broadcaster>,
    submission_retry: RetryPolicy,
}

impl SwapExecutor {
    pub fn new(
        chain: ProviderChain,
        broadcaster: Arc<dyn Broadcaster>,
        submission_retry: RetryPolicy,
    ) -> Self {
        Self {
            chain,
            broadcaster,
            submission_retry,
        }
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    /// Execute one swap under the request's identity
    pub async fn execute(&self, request: &SwapRequest) -> Result<SwapResult, SwapFailure> {
        let identity = request.identity();
        let label = identity.label();

        let resolution = match self.chain.resolve(request).await {
            Ok(resolution) => resolution,
            Err(Error::AllProvidersExhausted(log)) => {
                return Err(SwapFailure {
                    stage: FailureStage::Resolve,
                    provider: None,
                    tried: log.clone(),
                    error: Error::AllProvidersExhausted(log),
                });
            }
            Err(e) => {
                return Err(SwapFailure {
                    stage: FailureStage::Resolve,
                    provider: None,
                    tried: FailureLog::default(),
                    error: e,
                });
            }
        };

        let signed = sign_transaction(&resolution.transaction, identity.keypair()).map_err(|e| {
            SwapFailure {
                stage: FailureStage::Sign,
                provider: Some(resolution.provider.clone()),
                tried: resolution.failures.clone(),
                error: e,
            }
        })?;

        let transport = identity.transport();
        let outcome = self
            .submission_retry
            .run("submit", || self.broadcaster.send(&signed, transport))
            .await;

        match outcome.result {
            Ok(signature) => {
                if !resolution.failures.is_empty() {
                    warn!(
                        "[{}] {} succeeded after fallbacks: {}",
                        label, resolution.provider, resolution.failures
                    );
                }
                info!(
                    "[{}] swap {} {} -> {} via {}: {}",
                    label,
                    request.amount(),
                    request.input_mint(),
                    request.output_mint(),
                    resolution.provider,
                    signature
                );
                Ok(SwapResult {
                    signature,
                    provider: resolution.provider,
                    fallbacks: resolution.failures,
                })
            }
            Err(e) => Err(SwapFailure {
                stage: FailureStage::Submit,
                provider: Some(resolution.provider),
                tried: resolution.failures,
                error: Error::Submission(format!(
                    "{} after {} attempt(s)",
                    e, outcome.attempts
                )),
            }),
        }
    }
}
