use monitor_core::{CycleReport, DispatchOutcome};

/// Running totals across the cycles of one process.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleMetrics {
    pub cycles_run: u64,
    pub cycles_skipped: u64,
    pub cycles_cancelled: u64,
    pub instruments_failed: u64,
    pub alerts_sent: u64,
    pub dispatch_failures: u64,
    pub last_duration_ms: u64,
}

impl CycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_report(&mut self, report: &CycleReport) {
        if report.is_skipped() {
            self.cycles_skipped += 1;
            return;
        }

        self.cycles_run += 1;
        self.instruments_failed += report.failed as u64;
        self.last_duration_ms = report.duration_ms;

        match report.dispatch {
            DispatchOutcome::Sent => self.alerts_sent += report.alert_count() as u64,
            DispatchOutcome::Failed(_) => self.dispatch_failures += 1,
            DispatchOutcome::NotRequired => {}
        }
    }

    pub fn record_cancelled(&mut self) {
        self.cycles_cancelled += 1;
    }

    /// Emit structured telemetry via tracing
    pub fn log_metrics(&self) {
        tracing::info!(
            cycles = self.cycles_run,
            skipped = self.cycles_skipped,
            cancelled = self.cycles_cancelled,
            instruments_failed = self.instruments_failed,
            alerts_sent = self.alerts_sent,
            dispatch_failures = self.dispatch_failures,
            last_cycle_ms = self.last_duration_ms,
            "Monitor metrics summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use monitor_core::{
        AlertBatch, DailyDropAlert, FetchError, Instrument, InstrumentFailure, SkipReason,
    };

    fn report(dispatch: DispatchOutcome, failed: usize) -> CycleReport {
        let instrument = Instrument::new("AMD").unwrap();
        let batch = AlertBatch::new(
            vec![DailyDropAlert {
                instrument: instrument.clone(),
                change_percent: -6.0,
                current_price: 94.0,
                previous_close: 100.0,
            }],
            Vec::new(),
            Utc::now(),
        );
        CycleReport {
            started_at: Utc::now(),
            skipped: None,
            evaluated: failed + 1,
            succeeded: 1,
            failed,
            failures: (0..failed)
                .map(|_| InstrumentFailure {
                    instrument: instrument.clone(),
                    error: FetchError::Timeout("slow".into()),
                })
                .collect(),
            batch,
            dispatch,
            duration_ms: 1200,
        }
    }

    #[test]
    fn test_counts_sent_alerts() {
        let mut metrics = CycleMetrics::new();
        metrics.record_report(&report(DispatchOutcome::Sent, 2));

        assert_eq!(metrics.cycles_run, 1);
        assert_eq!(metrics.alerts_sent, 1);
        assert_eq!(metrics.instruments_failed, 2);
        assert_eq!(metrics.last_duration_ms, 1200);
        assert_eq!(metrics.dispatch_failures, 0);
    }

    #[test]
    fn test_failed_dispatch_sends_nothing() {
        let mut metrics = CycleMetrics::new();
        metrics.record_report(&report(DispatchOutcome::Failed("smtp down".into()), 0));

        assert_eq!(metrics.alerts_sent, 0);
        assert_eq!(metrics.dispatch_failures, 1);
    }

    #[test]
    fn test_skips_and_cancels_are_separate() {
        let mut metrics = CycleMetrics::new();
        metrics.record_report(&CycleReport::skipped(SkipReason::MarketClosed, Utc::now()));
        metrics.record_cancelled();

        assert_eq!(metrics.cycles_run, 0);
        assert_eq!(metrics.cycles_skipped, 1);
        assert_eq!(metrics.cycles_cancelled, 1);
    }
}
