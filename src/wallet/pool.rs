//! Identity pool loaded from the environment
//!
//! Identities are numbered from 1 and read until the first gap:
//! - `WALLET_PRIVATE_KEY_<n>`: base58 secret key (or JSON byte array)
//! - `WALLET_PROXY_<n>`: optional proxy for that identity

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{Error, Result};

use super::identity::{parse_keypair, Identity};
use super::proxy::ProxySpec;

pub const KEY_VAR_PREFIX: &str = "WALLET_PRIVATE_KEY_";
pub const PROXY_VAR_PREFIX: &str = "WALLET_PROXY_";

/// Raw identity entry before key parsing
#[derive(Debug, Clone)]
pub struct IdentityEntry {
    pub index: usize,
    pub secret: String,
    pub proxy: Option<String>,
}

/// Set of trading identities, fixed for the process lifetime
pub struct IdentityPool {
    identities: Vec<Arc<Identity>>,
}

impl IdentityPool {
    /// Load identities from process environment variables
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let entries = read_entries(|name| std::env::var(name).ok());
        if entries.is_empty() {
            return Err(Error::MissingEnvVar(format!("{}1", KEY_VAR_PREFIX)));
        }
        Self::from_entries(entries, timeout)
    }

    /// Build the pool from raw entries
    ///
    /// Any malformed entry is a configuration error, as is an empty pool or
    /// two identities sharing one proxy.
    pub fn from_entries(entries: Vec<IdentityEntry>, timeout: Duration) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Config(format!(
                "No identities configured (set {}1)",
                KEY_VAR_PREFIX
            )));
        }

        let mut identities = Vec::with_capacity(entries.len());
        let mut seen_keys = HashSet::new();
        let mut seen_proxies = HashSet::new();

        for entry in entries {
            let keypair = parse_keypair(&entry.secret).map_err(|e| {
                Error::Config(format!("{}{}: {}", KEY_VAR_PREFIX, entry.index, e))
            })?;

            let proxy = match entry.proxy.as_deref().map(str::trim) {
                Some(raw) if !raw.is_empty() => Some(ProxySpec::parse(raw).map_err(|e| {
                    Error::Config(format!("{}{}: {}", PROXY_VAR_PREFIX, entry.index, e))
                })?),
                _ => None,
            };

            if let Some(spec) = &proxy {
                if !seen_proxies.insert(spec.endpoint()) {
                    return Err(Error::Config(format!(
                        "{}{} reuses proxy {} already bound to another identity",
                        PROXY_VAR_PREFIX,
                        entry.index,
                        spec.masked()
                    )));
                }
            }

            let address = solana_sdk::signer::Signer::pubkey(&keypair).to_string();
            if !seen_keys.insert(address.clone()) {
                return Err(Error::Config(format!(
                    "{}{} duplicates wallet {}",
                    KEY_VAR_PREFIX, entry.index, address
                )));
            }

            let label = format!("w{}-{}", entry.index, &address[..4]);
            let identity = Identity::new(label, keypair, proxy, timeout)?;

            info!(
                "Loaded identity {}: {} via {}",
                identity.label(),
                identity.address(),
                identity.route()
            );
            identities.push(Arc::new(identity));
        }

        info!("IdentityPool initialized with {} identities", identities.len());

        Ok(Self { identities })
    }

    /// Build from already constructed identities
    pub fn from_identities(identities: Vec<Arc<Identity>>) -> Result<Self> {
        if identities.is_empty() {
            return Err(Error::Config("No identities configured".to_string()));
        }
        Ok(Self { identities })
    }

    /// Get the number of identities
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Get all identities in load order
    pub fn identities(&self) -> &[Arc<Identity>] {
        &self.identities
    }

    /// Log status of all identities
    pub fn log_status(&self) {
        info!("=== Identity Pool ===");
        for identity in &self.identities {
            info!(
                "  {} ({}): {}",
                identity.label(),
                &identity.address()[..12],
                identity.route()
            );
        }
        info!("  Total: {} identities", self.identities.len());
        info!("=====================");
    }
}

/// Collect numbered identity entries until the first missing key
pub fn read_entries<F>(lookup: F) -> Vec<IdentityEntry>
where
    F: Fn(&str) -> Option<String>,
{
    let mut entries = Vec::new();
    let mut index = 1;

    while let Some(secret) = lookup(&format!("{}{}", KEY_VAR_PREFIX, index)) {
        if secret.trim().is_empty() {
            break;
        }
        entries.push(IdentityEntry {
            index,
            secret,
            proxy: lookup(&format!("{}{}", PROXY_VAR_PREFIX, index)),
        });
        index += 1;
    }

    entries
}
