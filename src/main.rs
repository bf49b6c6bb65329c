//! Native Yield Automation
//!
//! Keeps the L1 withdrawal reserve on target while ETH is staked through a
//! Lido staking vault, and reports the resulting yield.
//! Features:
//! - Operation modes driven by the yield provider's ossification state
//! - LazyOracle report events with a max-inaction fallback
//! - Vault accounting reports proved against the IPFS report tree
//! - Validator partial withdrawals for reserve deficits
//! - Prometheus metrics on `/metrics`

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use native_yield_api::{BeaconNodeClient, IpfsClient, StakingApiClient};
use native_yield_chain::{
    DashboardContractClient, LazyOracleContractClient, ProviderManager, ReportWatcher,
    RollupYieldExtensionClient, TransactionSenderBuilder, VaultHubContractClient,
    YieldManagerContractClient,
};
use native_yield_core::{
    serve_metrics, BeaconChainStakingService, GaugeMetricsPoller, LidoAccountingReportService,
    NativeYieldMetricsUpdater, OperationModeMetricsRecorder, OperationModeProcessor,
    OperationModeSelector, OssificationCompleteProcessor, OssificationPendingProcessor,
    ProcessorDeps, ProcessorSettings, PrometheusMetricsService, RebalanceQuotaService,
    ServiceConfig, YieldReportingProcessor,
};

/// Optional path to a TOML config; the environment is used when unset.
const CONFIG_PATH_ENV: &str = "NATIVE_YIELD_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => ServiceConfig::from_file(&path)?,
        Err(_) => ServiceConfig::from_env()?,
    };
    config.log_config();

    info!("Starting native yield automation");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = initialize_components(&config).await?;

    let metrics_server = tokio::spawn(serve_metrics(
        app.metrics_service.clone(),
        config.api.port,
        shutdown_rx.clone(),
    ));
    let poller = tokio::spawn({
        let poller = app.poller.clone();
        let shutdown = shutdown_rx.clone();
        async move { poller.run(shutdown).await }
    });

    app.selector.start();
    info!("Operation mode selector running");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    app.selector.stop().await;
    shutdown_tx.send_replace(true);
    if let Err(e) = poller.await {
        error!(error = %e, "Gauge poller ended abnormally");
    }
    match metrics_server.await {
        Ok(Err(e)) => error!(error = %e, "Metrics server failed"),
        Err(e) => error!(error = %e, "Metrics server ended abnormally"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}

/// Human-readable logs by default, JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,native_yield_core=debug,native_yield_chain=debug")
            }),
        )
        .init();
}

struct App {
    metrics_service: Arc<PrometheusMetricsService>,
    selector: Arc<OperationModeSelector>,
    poller: Arc<GaugeMetricsPoller>,
}

async fn initialize_components(config: &ServiceConfig) -> Result<App> {
    info!("Initializing components...");
    let yield_provider = config.contracts.lido_yield_provider;

    // Metrics
    let metrics_service = Arc::new(PrometheusMetricsService::new()?);
    let metrics = NativeYieldMetricsUpdater::new(metrics_service.clone());

    // Chain access
    let provider = ProviderManager::new(&config.data_sources.l1_rpc_url).await?;
    let sender = Arc::new(
        TransactionSenderBuilder::new(&config.data_sources.l1_rpc_url, config.chain_id)
            .gas_error_reporter(Arc::new(metrics.clone()))
            .build(&config.signer.private_key)
            .await?,
    );
    info!(address = %sender.address, "Transaction sender initialized");

    let quota = Arc::new(RebalanceQuotaService::new(
        config.rebalance.staking_rebalance_quota_bps,
        config.rebalance.staking_rebalance_quota_window_size_in_cycles,
        config.rebalance.tolerance_amount_wei,
        metrics.clone(),
    ));
    info!(enabled = quota.is_enabled(), "Staking rebalance quota configured");

    let yield_manager = Arc::new(
        YieldManagerContractClient::new(
            config.contracts.yield_manager,
            yield_provider,
            config.contracts.linea_rollup,
            provider.clone(),
            sender.clone(),
        )
        .with_tolerance_bps(config.rebalance.tolerance_bps)
        .with_min_withdrawal_threshold_eth(config.rebalance.min_withdrawal_threshold_eth)
        .with_policy(quota),
    );
    let watcher = ReportWatcher::new(
        provider.provider().clone(),
        config.contracts.lazy_oracle,
        config.timing.trigger_event_poll_interval(),
    );
    let lazy_oracle = Arc::new(LazyOracleContractClient::new(
        config.contracts.lazy_oracle,
        provider.clone(),
        sender.clone(),
        watcher,
    ));
    let vault_hub = Arc::new(VaultHubContractClient::new(
        config.contracts.vault_hub,
        provider.clone(),
    ));
    let rollup = Arc::new(RollupYieldExtensionClient::new(
        config.contracts.linea_rollup,
        sender.clone(),
    ));
    let dashboard = Arc::new(DashboardContractClient);

    // Off-chain APIs
    let ipfs = Arc::new(IpfsClient::new(&config.data_sources.ipfs_base_url));
    let staking_api = Arc::new(StakingApiClient::new(&config.data_sources.staking_graphql_url));
    let beacon = Arc::new(BeaconNodeClient::new(&config.data_sources.beacon_chain_rpc_url));

    // Services
    let accounting = Arc::new(LidoAccountingReportService::new(lazy_oracle.clone(), ipfs));
    let beacon_staking = Arc::new(BeaconChainStakingService::new(
        yield_manager.clone(),
        staking_api.clone(),
        beacon.clone(),
        metrics.clone(),
        yield_provider,
        config
            .rebalance
            .max_validator_withdrawal_requests_per_transaction,
    ));
    let recorder = OperationModeMetricsRecorder::new(
        metrics.clone(),
        yield_manager.clone(),
        vault_hub.clone(),
        dashboard,
    );

    // Processors
    let deps = ProcessorDeps {
        yield_manager: yield_manager.clone(),
        lazy_oracle,
        vault_hub: vault_hub.clone(),
        rollup,
        accounting,
        beacon_staking,
        metrics: metrics.clone(),
        recorder: recorder.clone(),
    };
    let settings = ProcessorSettings::from_config(config);
    let processors: Vec<Arc<dyn OperationModeProcessor>> = vec![
        Arc::new(YieldReportingProcessor::new(deps.clone(), settings.clone())),
        Arc::new(OssificationPendingProcessor::new(deps.clone(), settings.clone())),
        Arc::new(OssificationCompleteProcessor::new(deps, settings)),
    ];

    let selector = Arc::new(OperationModeSelector::new(
        yield_manager.clone(),
        processors,
        metrics.clone(),
        yield_provider,
        config.timing.contract_read_retry(),
    ));

    let poller = Arc::new(GaugeMetricsPoller::new(
        recorder,
        metrics,
        yield_manager,
        vault_hub,
        staking_api,
        beacon,
        yield_provider,
        config.timing.gauge_metrics_poll_interval(),
    ));

    info!(yield_provider = %yield_provider, "All components initialized");

    Ok(App {
        metrics_service,
        selector,
        poller,
    })
}
