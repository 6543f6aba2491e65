use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use market_data::{PolygonClient, YahooFinanceClient};
use monitor_core::{MarketDataProvider, MonitorError};
use notification_service::{LogNotifier, NotificationChannel, NotificationConfig, NotificationService};
use stock_monitor::{
    calendar, cancel_pair, CancelSignal, CycleMetrics, CycleOrchestrator, MonitorConfig,
    ProviderKind,
};
use tokio::signal::unix::SignalKind;

#[derive(Parser, Debug)]
#[command(name = "stock-monitor", about = "Daily stock drop and decline alerts")]
struct Cli {
    /// Run a single cycle now and exit
    #[arg(long)]
    once: bool,

    /// Log the alert summary instead of sending it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(env_filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting stock monitor");

    let config = MonitorConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Instruments: {}", config.instrument_universe.len());
    tracing::info!("  Drop threshold: {:.1}%", config.drop_threshold * 100.0);
    tracing::info!("  Consecutive days: {}", config.consecutive_day_threshold);
    tracing::info!(
        "  Pacing: {}ms between requests, {} concurrent",
        config.inter_request_delay_ms,
        config.max_concurrent_fetches
    );
    tracing::info!("  Schedule: {} America/New_York", config.schedule_time);

    let provider: Box<dyn MarketDataProvider> = match config.provider {
        ProviderKind::Yahoo => Box::new(YahooFinanceClient::new()),
        ProviderKind::Polygon => {
            let api_key = config
                .polygon_api_key
                .clone()
                .ok_or_else(|| anyhow!("POLYGON_API_KEY must be set for the polygon provider"))?;
            Box::new(PolygonClient::new(api_key, config.polygon_rate_limit))
        }
    };
    tracing::info!("Market data provider: {}", provider.name());

    let channel: Box<dyn NotificationChannel> = if cli.dry_run {
        tracing::info!("Dry run: alert summaries will be logged, not sent");
        Box::new(LogNotifier)
    } else {
        let service = NotificationService::new(&NotificationConfig::from_env());
        if service.is_empty() {
            tracing::warn!("No notification channel configured, alerts will fail to dispatch");
        }
        Box::new(service)
    };

    let (cancel_handle, cancel) = cancel_pair();
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
        cancel_handle.cancel();
    });

    let orchestrator = CycleOrchestrator::new(&config);
    let mut metrics = CycleMetrics::new();

    if cli.once {
        run_cycle(&orchestrator, provider.as_ref(), channel.as_ref(), &cancel, &mut metrics).await;
        return Ok(());
    }

    loop {
        let next = calendar::next_run_after(Utc::now(), config.schedule_time);
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        tracing::info!("Next monitoring cycle at {} ({}s)", next, wait.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }

        if !run_cycle(&orchestrator, provider.as_ref(), channel.as_ref(), &cancel, &mut metrics).await {
            break;
        }
    }

    metrics.log_metrics();
    tracing::info!("Stock monitor shut down.");
    Ok(())
}

/// Returns false once the process should stop.
async fn run_cycle(
    orchestrator: &CycleOrchestrator<'_>,
    provider: &dyn MarketDataProvider,
    channel: &dyn NotificationChannel,
    cancel: &CancelSignal,
    metrics: &mut CycleMetrics,
) -> bool {
    match orchestrator.run_cycle(provider, channel, cancel).await {
        Ok(report) => {
            metrics.record_report(&report);
            if !report.is_skipped() {
                tracing::info!(
                    "Cycle summary: {} evaluated, {} failed, {} alerts, dispatch {:?}",
                    report.evaluated,
                    report.failed,
                    report.alert_count(),
                    report.dispatch
                );
            }
            metrics.log_metrics();
            true
        }
        Err(MonitorError::Cancelled(reason)) => {
            metrics.record_cancelled();
            tracing::warn!("Cycle cancelled: {}", reason);
            // A timed-out cycle leaves the stop signal untouched
            !cancel.is_cancelled()
        }
        Err(e) => {
            tracing::error!("Error in monitoring cycle: {}", e);
            true
        }
    }
}
