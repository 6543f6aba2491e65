use chrono::{NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use monitor_core::{
    render_with, AlertBatch, ConsecutiveDeclineAlert, CycleReport, DailyDropAlert, DeclineDetector,
    DispatchOutcome, DropDetector, FetchError, Instrument, InstrumentFailure, MarketDataProvider,
    MonitorError, PriceHistory, SkipReason, Thresholds,
};
use notification_service::NotificationChannel;
use tokio::time::Instant;

use crate::calendar;
use crate::cancel::CancelSignal;
use crate::config::MonitorConfig;
use crate::pacing::Pacer;

enum InstrumentOutcome {
    Evaluated {
        drop: Option<DailyDropAlert>,
        decline: Option<ConsecutiveDeclineAlert>,
    },
    Failed(InstrumentFailure),
}

/// Runs monitoring cycles over the configured universe.
///
/// Holds no state between cycles apart from the request pacer.
pub struct CycleOrchestrator<'a> {
    config: &'a MonitorConfig,
    drop_detector: DropDetector,
    decline_detector: DeclineDetector,
    pacer: Pacer,
}

impl<'a> CycleOrchestrator<'a> {
    pub fn new(config: &'a MonitorConfig) -> Self {
        Self {
            config,
            drop_detector: DropDetector::new(config.drop_threshold),
            decline_detector: DeclineDetector::new(config.consecutive_day_threshold),
            pacer: Pacer::new(config.pacing()),
        }
    }

    /// Runs one cycle for today's exchange date.
    pub async fn run_cycle(
        &self,
        provider: &dyn MarketDataProvider,
        channel: &dyn NotificationChannel,
        cancel: &CancelSignal,
    ) -> Result<CycleReport, MonitorError> {
        self.run_cycle_on(calendar::market_today(), provider, channel, cancel)
            .await
    }

    /// Runs one cycle as of `today`.
    ///
    /// Fetch failures only drop the affected instrument. Cancellation or the
    /// cycle timeout discard everything collected so far and nothing is sent.
    /// A failed dispatch is recorded in the report, not returned as an error.
    pub async fn run_cycle_on(
        &self,
        today: NaiveDate,
        provider: &dyn MarketDataProvider,
        channel: &dyn NotificationChannel,
        cancel: &CancelSignal,
    ) -> Result<CycleReport, MonitorError> {
        let started_at = Utc::now();
        let timer = Instant::now();

        if cancel.is_cancelled() {
            return Err(MonitorError::Cancelled("cancelled before start".into()));
        }

        if !calendar::is_market_day(today, &self.config.market_holidays) {
            tracing::info!("{} is not a trading day, skipping monitoring cycle", today);
            return Ok(CycleReport::skipped(SkipReason::MarketClosed, started_at));
        }

        let universe = &self.config.instrument_universe;
        tracing::info!(
            "Starting stock monitoring cycle for {} instruments via {}",
            universe.len(),
            provider.name()
        );

        let timeout = self.config.cycle_timeout();
        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Monitoring cycle cancelled, discarding collected alerts");
                return Err(MonitorError::Cancelled("stop requested".into()));
            }
            _ = deadline => {
                let secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
                tracing::warn!("Monitoring cycle exceeded {}s, discarding collected alerts", secs);
                return Err(MonitorError::Cancelled(format!("timed out after {}s", secs)));
            }
            outcomes = self.evaluate_universe(provider) => outcomes,
        };

        if cancel.is_cancelled() {
            return Err(MonitorError::Cancelled("stop requested".into()));
        }

        let evaluated = outcomes.len();
        let mut daily_drops = Vec::new();
        let mut consecutive_declines = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                InstrumentOutcome::Evaluated { drop, decline } => {
                    daily_drops.extend(drop);
                    consecutive_declines.extend(decline);
                }
                InstrumentOutcome::Failed(failure) => failures.push(failure),
            }
        }

        let batch = AlertBatch::new(daily_drops, consecutive_declines, Utc::now());
        let failed = failures.len();
        tracing::info!(
            "Evaluated {} instruments: {} succeeded, {} failed",
            evaluated,
            evaluated - failed,
            failed
        );

        let dispatch = self.dispatch(&batch, channel).await;

        let report = CycleReport {
            started_at,
            skipped: None,
            evaluated,
            succeeded: evaluated - failed,
            failed,
            failures,
            batch,
            dispatch,
            duration_ms: timer.elapsed().as_millis() as u64,
        };
        tracing::info!("Monitoring cycle completed in {}ms", report.duration_ms);

        Ok(report)
    }

    /// Fetches and evaluates every instrument. Output order is universe
    /// order whatever order the fetches complete in.
    async fn evaluate_universe(&self, provider: &dyn MarketDataProvider) -> Vec<InstrumentOutcome> {
        let universe = &self.config.instrument_universe;
        let total = universe.len();
        let lookback = self.config.fetch_lookback_days();
        let concurrency = self.pacer.policy().max_concurrency.max(1);

        stream::iter(universe.iter().enumerate())
            .map(move |(index, instrument)| async move {
                self.pacer.acquire().await;
                tracing::info!("Checking {} ({}/{})", instrument, index + 1, total);

                match provider.fetch_history(instrument, lookback).await {
                    Ok(history) => self.evaluate(&history),
                    Err(error) => {
                        log_fetch_failure(instrument, &error);
                        InstrumentOutcome::Failed(InstrumentFailure {
                            instrument: instrument.clone(),
                            error,
                        })
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await
    }

    fn evaluate(&self, history: &PriceHistory) -> InstrumentOutcome {
        let drop = self
            .drop_detector
            .evaluate(&history.latest(self.config.drop_lookback_days as usize));
        let decline = self
            .decline_detector
            .evaluate(&history.latest(self.config.decline_lookback_days as usize));

        if let Some(alert) = &drop {
            tracing::info!(
                "{}: {:.2}% drop detected",
                alert.instrument,
                alert.change_percent
            );
        }
        if let Some(alert) = &decline {
            tracing::info!(
                "{}: {} consecutive down days ({:.2}%)",
                alert.instrument,
                alert.consecutive_days,
                alert.total_decline_percent
            );
        }

        InstrumentOutcome::Evaluated { drop, decline }
    }

    async fn dispatch(&self, batch: &AlertBatch, channel: &dyn NotificationChannel) -> DispatchOutcome {
        if batch.is_empty() {
            tracing::info!("No alerts triggered");
            return DispatchOutcome::NotRequired;
        }

        let summary = render_with(
            batch,
            &Thresholds {
                drop_threshold: self.config.drop_threshold,
                consecutive_days: self.config.consecutive_day_threshold,
            },
        );
        tracing::info!(
            "{} alerts triggered - sending notification via {}",
            batch.len(),
            channel.name()
        );

        match channel.send(&summary).await {
            Ok(()) => DispatchOutcome::Sent,
            Err(e) => {
                tracing::error!("Failed to send alert batch via {}: {}", channel.name(), e);
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}

fn log_fetch_failure(instrument: &Instrument, error: &FetchError) {
    match error {
        FetchError::NotFound(_) | FetchError::Malformed(_) => {
            tracing::warn!("Skipping {} [{}]: {}", instrument, error.kind(), error)
        }
        FetchError::RateLimited(_) | FetchError::Timeout(_) | FetchError::Transport(_) => {
            tracing::error!("Error fetching {} [{}]: {}", instrument, error.kind(), error)
        }
    }
}
