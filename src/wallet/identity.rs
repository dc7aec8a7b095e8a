//! A trading identity: signing key plus its own outbound transport

use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use crate::error::{Error, Result};

use super::proxy::ProxySpec;

/// A trading identity
///
/// The transport is built once from the identity's proxy and is never handed
/// to another identity. Every provider and broadcast call made on behalf of
/// this identity goes through it.
#[derive(Debug)]
pub struct Identity {
    label: String,
    keypair: Keypair,
    proxy: Option<ProxySpec>,
    transport: reqwest::Client,
}

impl Identity {
    /// Create an identity and build its transport
    pub fn new(
        label: impl Into<String>,
        keypair: Keypair,
        proxy: Option<ProxySpec>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        builder = match &proxy {
            Some(spec) => builder.proxy(spec.to_reqwest()?),
            // No proxy: also ignore system proxy env vars so the path stays explicit
            None => builder.no_proxy(),
        };
        let transport = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build transport: {}", e)))?;

        Ok(Self {
            label: label.into(),
            keypair,
            proxy,
            transport,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn address(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn proxy(&self) -> Option<&ProxySpec> {
        self.proxy.as_ref()
    }

    /// The identity's exclusive outbound transport
    pub fn transport(&self) -> &reqwest::Client {
        &self.transport
    }

    /// Proxy description for logs
    pub fn route(&self) -> String {
        self.proxy
            .as_ref()
            .map(|p| p.masked())
            .unwrap_or_else(|| "direct".to_string())
    }
}

/// Parse a secret key given as base58 or as a JSON byte array
pub fn parse_keypair(raw: &str) -> Result<Keypair> {
    let raw = raw.trim();
    let bytes: Vec<u8> = if raw.starts_with('[') {
        serde_json::from_str(raw)
            .map_err(|e| Error::InvalidKeypair(format!("bad JSON byte array: {}", e)))?
    } else {
        bs58::decode(raw)
            .into_vec()
            .map_err(|e| Error::InvalidKeypair(format!("bad base58: {}", e)))?
    };

    Keypair::from_bytes(&bytes).map_err(|e| Error::InvalidKeypair(e.to_string()))
}
