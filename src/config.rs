//! Configuration loading and validation

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

/// Wrapped SOL mint
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Aggregator services, listed in priority order
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(alias = "jup")]
    Jupiter,
    Raydium,
    Okx,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_provider_order")]
    pub order: Vec<ProviderKind>,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default)]
    pub jupiter: JupiterConfig,
    #[serde(default)]
    pub raydium: RaydiumConfig,
    #[serde(default)]
    pub okx: OkxConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: default_provider_order(),
            slippage_bps: default_slippage_bps(),
            jupiter: JupiterConfig::default(),
            raydium: RaydiumConfig::default(),
            okx: OkxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JupiterConfig {
    #[serde(default = "default_jupiter_url")]
    pub base_url: String,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            base_url: default_jupiter_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaydiumConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_raydium_url")]
    pub base_url: String,
    #[serde(default = "default_compute_unit_price")]
    pub compute_unit_price_micro_lamports: u64,
}

impl Default for RaydiumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_raydium_url(),
            compute_unit_price_micro_lamports: default_compute_unit_price(),
        }
    }
}

/// OKX DEX credentials; the provider is unavailable unless key, secret and
/// passphrase are all present
#[derive(Debug, Clone, Deserialize)]
pub struct OkxConfig {
    #[serde(default = "default_okx_url")]
    pub base_url: String,
    #[serde(default = "default_okx_api_key")]
    pub api_key: String,
    #[serde(default = "default_okx_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_okx_passphrase")]
    pub passphrase: String,
    #[serde(default = "default_okx_project_id")]
    pub project_id: String,
}

impl Default for OkxConfig {
    fn default() -> Self {
        Self {
            base_url: default_okx_url(),
            api_key: default_okx_api_key(),
            secret_key: default_okx_secret_key(),
            passphrase: default_okx_passphrase(),
            project_id: default_okx_project_id(),
        }
    }
}

impl OkxConfig {
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty() && !self.passphrase.is_empty()
    }
}

/// Per-provider retry of transient network errors
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Broadcast-level retry, independent from provider retries
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_submission_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_true")]
    pub skip_preflight: bool,
    #[serde(default = "default_rpc_max_retries")]
    pub rpc_max_retries: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_submission_delay_ms(),
            skip_preflight: true,
            rpc_max_retries: default_rpc_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// IANA timezone name, e.g. "Asia/Shanghai"
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// First trading hour (inclusive)
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,
    /// Last trading hour (exclusive, 24 = midnight)
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
            daily_cap: default_daily_cap(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl SessionConfig {
    /// Parse the configured timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_source_mint")]
    pub source_mint: String,
    #[serde(default = "default_target_mints")]
    pub target_mints: Vec<String>,
    #[serde(default = "default_min_amount_sol")]
    pub min_amount_sol: f64,
    #[serde(default = "default_max_amount_sol")]
    pub max_amount_sol: f64,
    #[serde(default = "default_dwell_min_ms")]
    pub dwell_min_ms: u64,
    #[serde(default = "default_dwell_max_ms")]
    pub dwell_max_ms: u64,
    #[serde(default = "default_identity_delay_min_ms")]
    pub identity_delay_min_ms: u64,
    #[serde(default = "default_identity_delay_max_ms")]
    pub identity_delay_max_ms: u64,
    #[serde(default = "default_round_delay_min_ms")]
    pub round_delay_min_ms: u64,
    #[serde(default = "default_round_delay_max_ms")]
    pub round_delay_max_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            source_mint: default_source_mint(),
            target_mints: default_target_mints(),
            min_amount_sol: default_min_amount_sol(),
            max_amount_sol: default_max_amount_sol(),
            dwell_min_ms: default_dwell_min_ms(),
            dwell_max_ms: default_dwell_max_ms(),
            identity_delay_min_ms: default_identity_delay_min_ms(),
            identity_delay_max_ms: default_identity_delay_max_ms(),
            round_delay_min_ms: default_round_delay_min_ms(),
            round_delay_max_ms: default_round_delay_max_ms(),
        }
    }
}

impl ScheduleConfig {
    /// Amount bounds in lamports
    pub fn amount_bounds_lamports(&self) -> (u64, u64) {
        (
            sol_to_lamports(self.min_amount_sol),
            sol_to_lamports(self.max_amount_sol),
        )
    }
}

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * 1e9).round() as u64
}

// Default value functions
fn default_rpc_endpoint() -> String {
    std::env::var("RPC_ENDPOINT").unwrap_or_default()
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_provider_order() -> Vec<ProviderKind> {
    vec![ProviderKind::Jupiter, ProviderKind::Raydium, ProviderKind::Okx]
}

fn default_slippage_bps() -> u32 {
    50
}

fn default_jupiter_url() -> String {
    std::env::var("JUPITER_API_URL").unwrap_or_else(|_| "https://lite-api.jup.ag/swap/v1".into())
}

fn default_raydium_url() -> String {
    "https://transaction-v1.raydium.io".into()
}

fn default_compute_unit_price() -> u64 {
    100000
}

fn default_okx_url() -> String {
    "https://web3.okx.com".into()
}

fn default_okx_api_key() -> String {
    std::env::var("OKX_API_KEY").unwrap_or_default()
}

fn default_okx_secret_key() -> String {
    std::env::var("OKX_SECRET_KEY").unwrap_or_default()
}

fn default_okx_passphrase() -> String {
    std::env::var("OKX_PASSPHRASE").unwrap_or_default()
}

fn default_okx_project_id() -> String {
    std::env::var("OKX_PROJECT_ID").unwrap_or_default()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_submission_delay_ms() -> u64 {
    1000
}

fn default_rpc_max_retries() -> usize {
    3
}

fn default_timezone() -> String {
    "UTC".into()
}

fn default_start_hour() -> u32 {
    8
}

fn default_end_hour() -> u32 {
    24
}

fn default_daily_cap() -> u32 {
    120
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_source_mint() -> String {
    WSOL_MINT.into()
}

fn default_target_mints() -> Vec<String> {
    vec![
        // USDC
        "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into(),
        // USDT
        "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB".into(),
    ]
}

fn default_min_amount_sol() -> f64 {
    0.01
}

fn default_max_amount_sol() -> f64 {
    0.05
}

fn default_dwell_min_ms() -> u64 {
    30_000
}

fn default_dwell_max_ms() -> u64 {
    120_000
}

fn default_identity_delay_min_ms() -> u64 {
    60_000
}

fn default_identity_delay_max_ms() -> u64 {
    300_000
}

fn default_round_delay_min_ms() -> u64 {
    600_000
}

fn default_round_delay_max_ms() -> u64 {
    1_800_000
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix PACER_)
            .add_source(
                config::Environment::with_prefix("PACER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.rpc.endpoint.trim().is_empty() {
            anyhow::bail!("rpc.endpoint is not configured (set RPC_ENDPOINT)");
        }

        if self.providers.order.is_empty() {
            anyhow::bail!("providers.order must list at least one provider");
        }

        if self.providers.slippage_bps > 10000 {
            anyhow::bail!("slippage_bps cannot exceed 10000 (100%)");
        }

        // Backoff must grow from a non-zero base
        if self.retry.base_delay_ms == 0 {
            anyhow::bail!("retry.base_delay_ms must be positive");
        }
        if self.submission.base_delay_ms == 0 {
            anyhow::bail!("submission.base_delay_ms must be positive");
        }

        // Trading window
        self.session.tz()?;
        if self.session.start_hour > 23 {
            anyhow::bail!("session.start_hour must be 0-23");
        }
        if self.session.end_hour == 0 || self.session.end_hour > 24 {
            anyhow::bail!("session.end_hour must be 1-24");
        }
        if self.session.start_hour == self.session.end_hour {
            anyhow::bail!("session.start_hour and session.end_hour must differ");
        }
        if self.session.daily_cap == 0 {
            anyhow::bail!("session.daily_cap must be positive");
        }

        // Schedule
        Pubkey::from_str(&self.schedule.source_mint)
            .with_context(|| format!("Invalid source_mint: {}", self.schedule.source_mint))?;
        if self.schedule.target_mints.is_empty() {
            anyhow::bail!("schedule.target_mints cannot be empty");
        }
        for mint in &self.schedule.target_mints {
            Pubkey::from_str(mint).with_context(|| format!("Invalid target mint: {}", mint))?;
            if *mint == self.schedule.source_mint {
                anyhow::bail!("Target mint {} equals the source mint", mint);
            }
        }
        if !self.schedule.min_amount_sol.is_finite() || !self.schedule.max_amount_sol.is_finite() {
            anyhow::bail!("min_amount_sol and max_amount_sol must be finite numbers");
        }
        if self.schedule.min_amount_sol <= 0.0 {
            anyhow::bail!("min_amount_sol must be positive");
        }
        if self.schedule.max_amount_sol < self.schedule.min_amount_sol {
            anyhow::bail!("max_amount_sol must be >= min_amount_sol");
        }
        check_range("dwell", self.schedule.dwell_min_ms, self.schedule.dwell_max_ms)?;
        check_range(
            "identity_delay",
            self.schedule.identity_delay_min_ms,
            self.schedule.identity_delay_max_ms,
        )?;
        check_range(
            "round_delay",
            self.schedule.round_delay_min_ms,
            self.schedule.round_delay_max_ms,
        )?;

        if self.providers.order.contains(&ProviderKind::Okx) && !self.providers.okx.has_credentials()
        {
            tracing::warn!("OKX credentials not set - OKX provider will be skipped");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    timeout: {}ms
  Providers:
    order: {:?}
    slippage: {}bps
    jupiter: {}
    raydium: {} (enabled: {})
    okx: {} (api_key: {})
  Retry:
    provider: {} retries, base {}ms
    submission: {} retries, base {}ms, skip_preflight: {}
  Session:
    timezone: {}
    window: {:02}:00-{:02}:00
    daily_cap: {}
  Schedule:
    source: {}
    targets: {:?}
    amount: {}-{} SOL
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.providers.order,
            self.providers.slippage_bps,
            self.providers.jupiter.base_url,
            self.providers.raydium.base_url,
            self.providers.raydium.enabled,
            self.providers.okx.base_url,
            if self.providers.okx.api_key.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.retry.max_retries,
            self.retry.base_delay_ms,
            self.submission.max_retries,
            self.submission.base_delay_ms,
            self.submission.skip_preflight,
            self.session.timezone,
            self.session.start_hour,
            self.session.end_hour,
            self.session.daily_cap,
            self.schedule.source_mint,
            self.schedule.target_mints,
            self.schedule.min_amount_sol,
            self.schedule.max_amount_sol,
        )
    }
}

fn check_range(name: &str, min: u64, max: u64) -> Result<()> {
    if max < min {
        anyhow::bail!("{}_max_ms must be >= {}_min_ms", name, name);
    }
    Ok(())
}

/// Mask URL for display (hide API keys in query params)
pub fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                endpoint: default_rpc_endpoint(),
                timeout_ms: default_timeout_ms(),
            },
            providers: ProvidersConfig::default(),
            retry: RetryConfig::default(),
            submission: SubmissionConfig::default(),
            session: SessionConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}
