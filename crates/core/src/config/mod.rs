//! Configuration for the automation service.
//!
//! This module provides:
//! - Typed service configuration (endpoints, contracts, timing, rebalance
//!   thresholds, reporting switches, metrics port)
//! - Environment and TOML loading with validation errors per variable

mod env;
mod service;

pub use env::{parse_bool, ConfigError};
pub use service::{
    ApiConfig, ContractsConfig, DataSourcesConfig, RebalanceConfig, ReportingConfig,
    ServiceConfig, SignerConfig, TimingConfig,
};
