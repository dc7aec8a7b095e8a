//! Test doubles for providers and broadcast

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;

use crate::error::{Error, Result};
use crate::wallet::Identity;

use super::broadcast::Broadcaster;
use super::provider::{QuoteParams, SwapMode, SwapProvider, UnsignedTransaction};

pub fn test_identity(label: &str) -> Arc<Identity> {
    Arc::new(Identity::new(label, Keypair::new(), None, Duration::from_secs(5)).unwrap())
}

/// Unsigned single-signer transaction paid by `signer`
pub fn unsigned_for(signer: &Pubkey) -> UnsignedTransaction {
    let instruction = system_instruction::transfer(signer, signer, 1);
    let message = Message::new_with_blockhash(&[instruction], Some(signer), &Hash::new_unique());
    let tx = VersionedTransaction {
        signatures: vec![Signature::default()],
        message: VersionedMessage::Legacy(message),
    };
    UnsignedTransaction::from_bytes(bincode::serialize(&tx).unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Transient,
    QuoteFail,
    BuildFail,
}

/// What a provider was asked to do
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuote {
    pub input_mint: String,
    pub output_mint: String,
    pub amount: u64,
    pub mode: SwapMode,
    pub signer: String,
}

pub struct FakeProvider {
    name: String,
    available: bool,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    calls: AtomicU32,
    quotes: Mutex<Vec<RecordedQuote>>,
}

impl FakeProvider {
    pub fn new(name: &str, outcome: Outcome) -> Arc<Self> {
        Self::scripted(name, vec![], outcome)
    }

    /// Play `script` first, then repeat `fallback`
    pub fn scripted(name: &str, script: Vec<Outcome>, fallback: Outcome) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            available: true,
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicU32::new(0),
            quotes: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            available: false,
            script: Mutex::new(VecDeque::new()),
            fallback: Outcome::Succeed,
            calls: AtomicU32::new(0),
            quotes: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn quotes(&self) -> Vec<RecordedQuote> {
        self.quotes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn quote_and_build(
        &self,
        params: &QuoteParams<'_>,
        _transport: &reqwest::Client,
    ) -> Result<UnsignedTransaction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.quotes.lock().unwrap().push(RecordedQuote {
            input_mint: params.input_mint.to_string(),
            output_mint: params.output_mint.to_string(),
            amount: params.amount,
            mode: params.mode,
            signer: params.signer.clone(),
        });

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        match outcome {
            Outcome::Succeed => {
                let signer = Pubkey::from_str(&params.signer).unwrap();
                Ok(unsigned_for(&signer))
            }
            Outcome::Transient => Err(Error::Connection(format!("{} reset", self.name))),
            Outcome::QuoteFail => Err(Error::ProviderQuote {
                provider: self.name.clone(),
                reason: "no route".to_string(),
            }),
            Outcome::BuildFail => Err(Error::ProviderBuild {
                provider: self.name.clone(),
                reason: "missing transaction".to_string(),
            }),
        }
    }
}

/// Broadcaster that records what it was asked to send
#[derive(Default)]
pub struct RecordingBroadcaster {
    transient_failures: AtomicU32,
    reject: bool,
    sent: Mutex<Vec<VersionedTransaction>>,
    calls: AtomicU32,
}

impl RecordingBroadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the first `n` sends with a transient error
    pub fn flaky(n: u32) -> Arc<Self> {
        Arc::new(Self {
            transient_failures: AtomicU32::new(n),
            ..Default::default()
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Default::default()
        })
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn send(
        &self,
        transaction: &VersionedTransaction,
        _transport: &reqwest::Client,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(Error::RpcRejected("Blockhash not found".to_string()));
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Timeout("rpc slow".to_string()));
        }
        self.sent.lock().unwrap().push(transaction.clone());
        Ok(transaction.signatures[0].to_string())
    }
}
