//! Configuration for the pump.fun bundler
//!
//! Loaded from a TOML file, with `.env` and environment variable overrides
//! for the RPC endpoint and the relay credential. Every section is optional
//! and falls back to the launch defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{
    sol_to_lamports, DEFAULT_COMPUTE_UNIT_LIMIT, DEFAULT_COMPUTE_UNIT_PRICE,
    DEFAULT_METADATA_API_URL, DEFAULT_MULTI_BUY_COMPUTE_UNIT_LIMIT, DEFAULT_REBUY_MAX_SOL,
    DEFAULT_RELAY_URL, DEFAULT_TIP_ACCOUNTS, DEFAULT_TIP_LAMPORTS, FUNDING_COMPUTE_UNIT_LIMIT,
    FUNDING_COMPUTE_UNIT_PRICE,
};
use crate::metadata::TokenMetadata;
use crate::retry::{PollSettings, RetryPolicy};
use crate::tx_builder::{ComputeBudget, SimulationPolicy, TipConfig, TxBuilderConfig};

pub const RPC_URL_ENV: &str = "RPC_URL";
pub const RELAY_AUTH_TOKEN_ENV: &str = "BLOXROUTE_AUTH_TOKEN";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcConfig,
    pub relay: RelayConfig,
    pub wallets: WalletsConfig,
    pub trading: TradingConfig,
    pub workflow: WorkflowConfig,
    /// Token to create on launch
    pub token: TokenMetadata,
    pub metadata: MetadataConfig,
    pub funding: FundingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// processed, confirmed or finalized
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub submit_batch_url: String,

    /// Usually supplied through BLOXROUTE_AUTH_TOKEN
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,

    pub tip_lamports: u64,

    pub tip_accounts: Vec<String>,

    /// Fail a bundle when any of its transactions fails simulation
    pub abort_on_simulation_failure: bool,

    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletsConfig {
    /// Directory holding creator.json, second.json, third.json and mintAddr.json
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Creator's seed buy in SOL
    pub dev_buy_sol: f64,

    /// Secondary wallet buy in SOL
    pub wallet_buy_sol: f64,

    /// Maximum slippage tolerance (basis points)
    pub max_slippage_bps: u16,

    /// Spend cap for the third wallet's rebuy
    pub rebuy_max_sol: f64,

    pub compute_unit_limit: u32,
    pub multi_buy_compute_unit_limit: u32,

    /// Micro-lamports per compute unit
    pub compute_unit_price: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub poll_interval_ms: u64,
    pub poll_error_backoff_ms: u64,

    /// Unset waits for the secondary balance until cancelled
    pub poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub api_url: String,
    pub image_path: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingConfig {
    /// SOL sent to a freshly created wallet
    pub amount_sol: f64,

    /// Added on top of `amount_sol` to cover rent and fees
    pub extra_lamports: u64,

    pub max_retries: u32,
    pub base_delay_ms: u64,
}

// Default value functions
fn default_rpc_endpoint() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_relay_timeout() -> u64 { 30 }
fn default_wallet_dir() -> String { "wallets".to_string() }
fn default_buy_sol() -> f64 { 0.0001 }
fn default_max_slippage() -> u16 { 500 }
fn default_poll_interval_ms() -> u64 { 1_000 }
fn default_poll_error_backoff_ms() -> u64 { 200 }
fn default_image_path() -> String { "images/token.jpg".to_string() }
fn default_metadata_timeout() -> u64 { 60 }
fn default_funding_amount() -> f64 { 0.01 }
fn default_funding_extra_lamports() -> u64 { 35_000_000 }
fn default_funding_retries() -> u32 { 3 }
fn default_funding_base_delay_ms() -> u64 { 1_000 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_secs: default_rpc_timeout(),
            commitment: default_commitment(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            submit_batch_url: DEFAULT_RELAY_URL.to_string(),
            auth_token: None,
            tip_lamports: DEFAULT_TIP_LAMPORTS,
            tip_accounts: DEFAULT_TIP_ACCOUNTS.iter().map(|s| s.to_string()).collect(),
            abort_on_simulation_failure: false,
            timeout_secs: default_relay_timeout(),
        }
    }
}

impl Default for WalletsConfig {
    fn default() -> Self {
        Self {
            dir: default_wallet_dir(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            dev_buy_sol: default_buy_sol(),
            wallet_buy_sol: default_buy_sol(),
            max_slippage_bps: default_max_slippage(),
            rebuy_max_sol: DEFAULT_REBUY_MAX_SOL,
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            multi_buy_compute_unit_limit: DEFAULT_MULTI_BUY_COMPUTE_UNIT_LIMIT,
            compute_unit_price: DEFAULT_COMPUTE_UNIT_PRICE,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_error_backoff_ms: default_poll_error_backoff_ms(),
            poll_timeout_secs: None,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_METADATA_API_URL.to_string(),
            image_path: default_image_path(),
            timeout_secs: default_metadata_timeout(),
        }
    }
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            amount_sol: default_funding_amount(),
            extra_lamports: default_funding_extra_lamports(),
            max_retries: default_funding_retries(),
            base_delay_ms: default_funding_base_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load `.env`, the TOML file (defaults if absent), then environment overrides.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies `RPC_URL` and `BLOXROUTE_AUTH_TOKEN` from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(RPC_URL_ENV).filter(|v| !v.is_empty()) {
            self.rpc.endpoint = url;
        }
        if let Some(token) = lookup(RELAY_AUTH_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.relay.auth_token = Some(token);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.relay.tip_accounts.is_empty() {
            bail!("relay.tip_accounts must contain at least one address");
        }
        self.tip_config()
            .map_err(|e| anyhow::anyhow!("relay.tip_accounts: {e}"))?;
        if self.workflow.poll_interval_ms == 0 {
            bail!("workflow.poll_interval_ms must be positive");
        }
        if self.trading.max_slippage_bps > 10_000 {
            bail!(
                "trading.max_slippage_bps must be at most 10000, got {}",
                self.trading.max_slippage_bps
            );
        }
        for (name, value) in [
            ("trading.dev_buy_sol", self.trading.dev_buy_sol),
            ("trading.wallet_buy_sol", self.trading.wallet_buy_sol),
            ("trading.rebuy_max_sol", self.trading.rebuy_max_sol),
            ("funding.amount_sol", self.funding.amount_sol),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{name} must be a non-negative number, got {value}");
            }
        }
        Ok(())
    }

    pub fn tip_config(&self) -> Result<TipConfig, crate::tx_builder::TransactionBuilderError> {
        TipConfig::from_addresses(&self.relay.tip_accounts, self.relay.tip_lamports)
    }

    pub fn tx_builder_config(&self) -> TxBuilderConfig {
        let standard = ComputeBudget {
            unit_limit: self.trading.compute_unit_limit,
            unit_price: self.trading.compute_unit_price,
        };
        TxBuilderConfig {
            create: standard,
            multi_buy: ComputeBudget {
                unit_limit: self.trading.multi_buy_compute_unit_limit,
                unit_price: self.trading.compute_unit_price,
            },
            multi_sell: standard,
            funding: ComputeBudget {
                unit_limit: FUNDING_COMPUTE_UNIT_LIMIT,
                unit_price: FUNDING_COMPUTE_UNIT_PRICE,
            },
        }
    }

    pub fn simulation_policy(&self) -> SimulationPolicy {
        SimulationPolicy {
            abort_on_failure: self.relay.abort_on_simulation_failure,
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.workflow.poll_interval_ms),
            error_backoff: Duration::from_millis(self.workflow.poll_error_backoff_ms),
            timeout: self.workflow.poll_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn funding_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.funding.max_retries,
            Duration::from_millis(self.funding.base_delay_ms),
        )
    }

    pub fn funding_lamports(&self) -> u64 {
        sol_to_lamports(self.funding.amount_sol).saturating_add(self.funding.extra_lamports)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay.timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata.timeout_secs)
    }
}
