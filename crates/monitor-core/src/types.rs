use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, FetchError};

/// Ticker symbol, normalized to trimmed upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instrument(String);

impl Instrument {
    pub fn new(symbol: impl AsRef<str>) -> Result<Self, ConfigError> {
        let raw = symbol.as_ref();
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidSymbol(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn symbol(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Instrument {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Instrument::new(s)
    }
}

impl TryFrom<String> for Instrument {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Instrument::new(value)
    }
}

impl From<Instrument> for String {
    fn from(value: Instrument) -> Self {
        value.0
    }
}

/// Daily close for one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Closing prices for one instrument, oldest first, one point per day.
///
/// Only constructible through the validating constructors, and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistory {
    instrument: Instrument,
    points: Vec<PricePoint>,
}

impl PriceHistory {
    /// Sorts `points` by date and rejects duplicate days and non-positive
    /// or non-finite closes.
    pub fn new(instrument: Instrument, mut points: Vec<PricePoint>) -> Result<Self, FetchError> {
        points.sort_by_key(|p| p.date);

        if let Some(bad) = points.iter().find(|p| !p.close.is_finite() || p.close <= 0.0) {
            return Err(FetchError::Malformed(format!(
                "{}: invalid close {} on {}",
                instrument, bad.close, bad.date
            )));
        }

        if let Some(pair) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(FetchError::Malformed(format!(
                "{}: duplicate price point for {}",
                instrument, pair[0].date
            )));
        }

        Ok(Self { instrument, points })
    }

    /// Builds a history from closes on consecutive calendar days starting at
    /// `first_date`.
    pub fn from_closes(
        instrument: Instrument,
        first_date: NaiveDate,
        closes: &[f64],
    ) -> Result<Self, FetchError> {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint::new(first_date + Duration::days(i as i64), close))
            .collect();
        Self::new(instrument, points)
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    /// The most recent `days` points as a new history (the whole history if
    /// it is shorter).
    pub fn latest(&self, days: usize) -> PriceHistory {
        let start = self.points.len().saturating_sub(days);
        PriceHistory {
            instrument: self.instrument.clone(),
            points: self.points[start..].to_vec(),
        }
    }
}

/// Single-day drop at or beyond the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyDropAlert {
    pub instrument: Instrument,
    /// Day-over-day change in percent, negative.
    pub change_percent: f64,
    pub current_price: f64,
    pub previous_close: f64,
}

/// Run of strictly decreasing closes ending at the latest point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsecutiveDeclineAlert {
    pub instrument: Instrument,
    pub consecutive_days: usize,
    pub current_price: f64,
    /// Last close before the run began.
    pub start_price: f64,
    pub total_decline_percent: f64,
}

/// Everything one cycle triggered, in universe order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertBatch {
    daily_drops: Vec<DailyDropAlert>,
    consecutive_declines: Vec<ConsecutiveDeclineAlert>,
    generated_at: DateTime<Utc>,
}

impl AlertBatch {
    pub fn new(
        daily_drops: Vec<DailyDropAlert>,
        consecutive_declines: Vec<ConsecutiveDeclineAlert>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            daily_drops,
            consecutive_declines,
            generated_at,
        }
    }

    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), Vec::new(), generated_at)
    }

    pub fn daily_drops(&self) -> &[DailyDropAlert] {
        &self.daily_drops
    }

    pub fn consecutive_declines(&self) -> &[ConsecutiveDeclineAlert] {
        &self.consecutive_declines
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn len(&self) -> usize {
        self.daily_drops.len() + self.consecutive_declines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daily_drops.is_empty() && self.consecutive_declines.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    MarketClosed,
}

/// What happened to the batch at the end of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    /// Empty batch or skipped cycle; the transport was not called.
    NotRequired,
    Sent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentFailure {
    pub instrument: Instrument,
    pub error: FetchError,
}

/// Outcome of one monitoring cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub skipped: Option<SkipReason>,
    pub evaluated: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<InstrumentFailure>,
    pub batch: AlertBatch,
    pub dispatch: DispatchOutcome,
    pub duration_ms: u64,
}

impl CycleReport {
    pub fn skipped(reason: SkipReason, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            skipped: Some(reason),
            evaluated: 0,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            batch: AlertBatch::empty(started_at),
            dispatch: DispatchOutcome::NotRequired,
            duration_ms: 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn alert_count(&self) -> usize {
        self.batch.len()
    }
}
