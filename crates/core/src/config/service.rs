//! Service configuration.
//!
//! Loaded once at start-up from the environment (after `.env`) or from a
//! TOML file, then passed by value into the components that need it.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::env::{ConfigError, EnvSource};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub chain_id: u64,

    pub data_sources: DataSourcesConfig,

    pub contracts: ContractsConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub rebalance: RebalanceConfig,

    #[serde(default)]
    pub reporting: ReportingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub signer: SignerConfig,
}

/// RPC and HTTP endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourcesConfig {
    pub l1_rpc_url: String,
    pub beacon_chain_rpc_url: String,
    pub staking_graphql_url: String,
    /// Gateway prefix the report CID is appended to
    pub ipfs_base_url: String,
}

/// Contract and recipient addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Rollup contract, also the L1 message service holding the reserve
    pub linea_rollup: Address,
    pub lazy_oracle: Address,
    pub vault_hub: Address,
    pub yield_manager: Address,
    pub lido_yield_provider: Address,
    pub l2_yield_recipient: Address,
}

/// Loop timing, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// LazyOracle watcher poll interval
    #[serde(default = "default_trigger_event_poll_interval")]
    pub trigger_event_poll_interval_ms: u64,

    /// Upper bound on the wait for a report event
    #[serde(default = "default_trigger_max_inaction")]
    pub trigger_max_inaction_ms: u64,

    /// Delay before retrying a failed mode-selection read
    #[serde(default = "default_contract_read_retry")]
    pub contract_read_retry_time_ms: u64,

    #[serde(default = "default_gauge_metrics_poll_interval")]
    pub gauge_metrics_poll_interval_ms: u64,
}

fn default_trigger_event_poll_interval() -> u64 {
    12_000
}
fn default_trigger_max_inaction() -> u64 {
    86_400_000
}
fn default_contract_read_retry() -> u64 {
    5_000
}
fn default_gauge_metrics_poll_interval() -> u64 {
    60_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            trigger_event_poll_interval_ms: default_trigger_event_poll_interval(),
            trigger_max_inaction_ms: default_trigger_max_inaction(),
            contract_read_retry_time_ms: default_contract_read_retry(),
            gauge_metrics_poll_interval_ms: default_gauge_metrics_poll_interval(),
        }
    }
}

impl TimingConfig {
    pub fn trigger_event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_event_poll_interval_ms)
    }
    pub fn trigger_max_inaction(&self) -> Duration {
        Duration::from_millis(self.trigger_max_inaction_ms)
    }
    pub fn contract_read_retry(&self) -> Duration {
        Duration::from_millis(self.contract_read_retry_time_ms)
    }
    pub fn gauge_metrics_poll_interval(&self) -> Duration {
        Duration::from_millis(self.gauge_metrics_poll_interval_ms)
    }
}

/// Rebalance thresholds and the staking quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// Tolerance band around the target reserve, in bps of total system balance
    #[serde(default)]
    pub tolerance_bps: u32,

    /// Stake requests below this are treated as noise by the quota
    #[serde(default)]
    pub tolerance_amount_wei: U256,

    /// Minimum reserve top-up, whole ETH
    #[serde(default)]
    pub min_withdrawal_threshold_eth: u64,

    /// 0 disables validator withdrawal requests
    #[serde(default = "default_max_withdrawal_requests")]
    pub max_validator_withdrawal_requests_per_transaction: u32,

    /// 0 disables the quota
    #[serde(default)]
    pub staking_rebalance_quota_bps: u32,

    /// 0 disables the quota
    #[serde(default)]
    pub staking_rebalance_quota_window_size_in_cycles: u32,
}

fn default_max_withdrawal_requests() -> u32 {
    16
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            tolerance_bps: 0,
            tolerance_amount_wei: U256::ZERO,
            min_withdrawal_threshold_eth: 0,
            max_validator_withdrawal_requests_per_transaction: default_max_withdrawal_requests(),
            staking_rebalance_quota_bps: 0,
            staking_rebalance_quota_window_size_in_cycles: 0,
        }
    }
}

/// Feature switches for the reporting path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    #[serde(default = "default_true")]
    pub should_submit_vault_report: bool,

    #[serde(default = "default_true")]
    pub should_report_yield: bool,

    #[serde(default = "default_true")]
    pub is_unpause_staking_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            should_submit_vault_report: true,
            should_report_yield: true,
            is_unpause_staking_enabled: true,
        }
    }
}

/// Metrics HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_port() -> u16 {
    3000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

/// Transaction signer.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SignerConfig {
    #[serde(default, skip_serializing)]
    pub private_key: String,
}

impl std::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl ServiceConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource::new(|var| std::env::var(var).ok()))
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource::new(lookup))
    }

    fn from_source(env: &EnvSource<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            chain_id: env.u64_required("CHAIN_ID")?,
            data_sources: DataSourcesConfig {
                l1_rpc_url: env.url("L1_RPC_URL")?,
                beacon_chain_rpc_url: env.url("BEACON_CHAIN_RPC_URL")?,
                staking_graphql_url: env.url("STAKING_GRAPHQL_URL")?,
                ipfs_base_url: env.url("IPFS_BASE_URL")?,
            },
            contracts: ContractsConfig {
                linea_rollup: env.address("LINEA_ROLLUP_ADDRESS")?,
                lazy_oracle: env.address("LAZY_ORACLE_ADDRESS")?,
                vault_hub: env.address("VAULT_HUB_ADDRESS")?,
                yield_manager: env.address("YIELD_MANAGER_ADDRESS")?,
                lido_yield_provider: env.address("LIDO_YIELD_PROVIDER_ADDRESS")?,
                l2_yield_recipient: env.address("L2_YIELD_RECIPIENT")?,
            },
            timing: TimingConfig {
                trigger_event_poll_interval_ms: env.u64_or(
                    "TRIGGER_EVENT_POLL_INTERVAL_MS",
                    default_trigger_event_poll_interval(),
                )?,
                trigger_max_inaction_ms: env
                    .u64_or("TRIGGER_MAX_INACTION_MS", default_trigger_max_inaction())?,
                contract_read_retry_time_ms: env
                    .u64_or("CONTRACT_READ_RETRY_TIME_MS", default_contract_read_retry())?,
                gauge_metrics_poll_interval_ms: env.u64_or(
                    "GAUGE_METRICS_POLL_INTERVAL_MS",
                    default_gauge_metrics_poll_interval(),
                )?,
            },
            rebalance: RebalanceConfig {
                tolerance_bps: env.u32_or("REBALANCE_TOLERANCE_BPS", 0)?,
                tolerance_amount_wei: env.u256_or("REBALANCE_TOLERANCE_AMOUNT_WEI", U256::ZERO)?,
                min_withdrawal_threshold_eth: env.u64_or("MIN_WITHDRAWAL_THRESHOLD_ETH", 0)?,
                max_validator_withdrawal_requests_per_transaction: env.u32_or(
                    "MAX_VALIDATOR_WITHDRAWAL_REQUESTS_PER_TRANSACTION",
                    default_max_withdrawal_requests(),
                )?,
                staking_rebalance_quota_bps: env.u32_or("STAKING_REBALANCE_QUOTA_BPS", 0)?,
                staking_rebalance_quota_window_size_in_cycles: env
                    .u32_or("STAKING_REBALANCE_QUOTA_WINDOW_SIZE_IN_CYCLES", 0)?,
            },
            reporting: ReportingConfig {
                should_submit_vault_report: env.bool_or("SHOULD_SUBMIT_VAULT_REPORT", true)?,
                should_report_yield: env.bool_or("SHOULD_REPORT_YIELD", true)?,
                is_unpause_staking_enabled: env.bool_or("IS_UNPAUSE_STAKING_ENABLED", true)?,
            },
            api: ApiConfig {
                port: env.u16_or("API_PORT", default_api_port())?,
            },
            signer: SignerConfig {
                private_key: env.required("PRIVATE_KEY")?,
            },
        })
    }

    /// Load configuration from a TOML file. The signer key, when absent from
    /// the file, is taken from `PRIVATE_KEY`.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        if config.signer.private_key.is_empty() {
            config.signer.private_key = std::env::var("PRIVATE_KEY")
                .map_err(|_| ConfigError::Missing("PRIVATE_KEY".to_string()))?;
        }
        Ok(config)
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(chain_id = self.chain_id, "Service configuration loaded");
        tracing::info!(
            l1_rpc = %self.data_sources.l1_rpc_url,
            beacon = %self.data_sources.beacon_chain_rpc_url,
            staking_api = %self.data_sources.staking_graphql_url,
            ipfs = %self.data_sources.ipfs_base_url,
            "Data sources"
        );
        tracing::info!(
            linea_rollup = %self.contracts.linea_rollup,
            lazy_oracle = %self.contracts.lazy_oracle,
            vault_hub = %self.contracts.vault_hub,
            yield_manager = %self.contracts.yield_manager,
            yield_provider = %self.contracts.lido_yield_provider,
            l2_recipient = %self.contracts.l2_yield_recipient,
            "Contracts"
        );
        tracing::info!(
            poll_ms = self.timing.trigger_event_poll_interval_ms,
            max_inaction_ms = self.timing.trigger_max_inaction_ms,
            read_retry_ms = self.timing.contract_read_retry_time_ms,
            gauge_poll_ms = self.timing.gauge_metrics_poll_interval_ms,
            "Timing"
        );
        tracing::info!(
            tolerance_bps = self.rebalance.tolerance_bps,
            tolerance_amount_wei = %self.rebalance.tolerance_amount_wei,
            min_withdrawal_eth = self.rebalance.min_withdrawal_threshold_eth,
            max_withdrawal_requests = self.rebalance.max_validator_withdrawal_requests_per_transaction,
            quota_bps = self.rebalance.staking_rebalance_quota_bps,
            quota_window = self.rebalance.staking_rebalance_quota_window_size_in_cycles,
            "Rebalance"
        );
        tracing::info!(
            submit_vault_report = self.reporting.should_submit_vault_report,
            report_yield = self.reporting.should_report_yield,
            unpause_staking = self.reporting.is_unpause_staking_enabled,
            "Reporting"
        );
        tracing::info!(port = self.api.port, "Metrics API");
    }
}
