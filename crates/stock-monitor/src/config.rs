use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use monitor_core::{ConfigError, Instrument, DEFAULT_CONSECUTIVE_DAYS, DEFAULT_DROP_THRESHOLD};

use crate::pacing::PacingPolicy;

/// Watchlist used when `WATCHLIST` is not set.
pub const DEFAULT_UNIVERSE: [&str; 44] = [
    "ADBE", "AMD", "GOOG", "AMZN", "AXP", "AAPL", "CLSK", "CRWD", "CVS", "DDOG", "DEFT", "ELV",
    "XOM", "FIG", "HAL", "HUM", "INTC", "LMT", "LCID", "META", "MSFT", "NVTS", "NVDA", "PLTR",
    "RIVN", "HOOD", "RCKT", "SLB", "SNOW", "SOFI", "TSLA", "UNH", "VOO", "WMT", "BAC", "SMCI",
    "SNAP", "CVX", "GOOGL", "VTI", "JPM", "RDDT", "BITF", "WFC",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Yahoo,
    Polygon,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(ProviderKind::Yahoo),
            "polygon" => Ok(ProviderKind::Polygon),
            other => Err(format!("unknown provider {:?} (expected yahoo or polygon)", other)),
        }
    }
}

/// Monitor settings, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    // Thresholds
    pub drop_threshold: f64,             // 0.05 (5%)
    pub consecutive_day_threshold: usize, // 3

    // Lookback windows, in trading days
    pub drop_lookback_days: u32,    // 5
    pub decline_lookback_days: u32, // 10

    // Pacing
    pub inter_request_delay_ms: u64, // 500
    pub max_concurrent_fetches: usize,
    pub cycle_timeout_secs: Option<u64>,

    pub instrument_universe: Vec<Instrument>,

    // Scheduling (America/New_York)
    pub market_holidays: Vec<NaiveDate>,
    pub schedule_time: NaiveTime,

    // Market data
    pub provider: ProviderKind,
    pub polygon_api_key: Option<String>,
    pub polygon_rate_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            drop_threshold: DEFAULT_DROP_THRESHOLD,
            consecutive_day_threshold: DEFAULT_CONSECUTIVE_DAYS,
            drop_lookback_days: 5,
            decline_lookback_days: 10,
            inter_request_delay_ms: 500,
            max_concurrent_fetches: 1,
            cycle_timeout_secs: None,
            instrument_universe: DEFAULT_UNIVERSE
                .iter()
                .filter_map(|s| Instrument::new(s).ok())
                .collect(),
            market_holidays: Vec::new(),
            schedule_time: NaiveTime::from_hms_opt(17, 30, 0).unwrap_or_default(),
            provider: ProviderKind::Yahoo,
            polygon_api_key: None,
            polygon_rate_limit: 5,
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, var: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.raw(var) {
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::invalid(var, format!("{:?}: {}", value, e))),
            None => Ok(default),
        }
    }

    fn list<T>(&self, var: &str) -> Result<Option<Vec<T>>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.raw(var)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse()
                            .map_err(|e| ConfigError::invalid(var, format!("{:?}: {}", s, e)))
                    })
                    .collect()
            })
            .transpose()
    }
}

impl MonitorConfig {
    /// Load from the process environment and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup and validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Self::default();

        let cycle_timeout_secs = match env.parse::<u64>("CYCLE_TIMEOUT_SECS", 0)? {
            0 => None,
            secs => Some(secs),
        };

        let config = Self {
            drop_threshold: env.parse("DROP_THRESHOLD", defaults.drop_threshold)?,
            consecutive_day_threshold: env
                .parse("CONSECUTIVE_DAY_THRESHOLD", defaults.consecutive_day_threshold)?,
            drop_lookback_days: env.parse("DROP_LOOKBACK_DAYS", defaults.drop_lookback_days)?,
            decline_lookback_days: env
                .parse("DECLINE_LOOKBACK_DAYS", defaults.decline_lookback_days)?,
            inter_request_delay_ms: env
                .parse("INTER_REQUEST_DELAY_MS", defaults.inter_request_delay_ms)?,
            max_concurrent_fetches: env
                .parse("MAX_CONCURRENT_FETCHES", defaults.max_concurrent_fetches)?,
            cycle_timeout_secs,
            instrument_universe: env
                .list("WATCHLIST")?
                .unwrap_or(defaults.instrument_universe),
            market_holidays: env.list("MARKET_HOLIDAYS")?.unwrap_or_default(),
            schedule_time: env.parse("SCHEDULE_TIME", defaults.schedule_time)?,
            provider: env.parse("MARKET_DATA_PROVIDER", defaults.provider)?,
            polygon_api_key: env.raw("POLYGON_API_KEY"),
            polygon_rate_limit: env.parse("POLYGON_RATE_LIMIT", defaults.polygon_rate_limit)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument_universe.is_empty() {
            return Err(ConfigError::invalid("WATCHLIST", "instrument universe is empty"));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.instrument_universe.iter().find(|i| !seen.insert(*i)) {
            return Err(ConfigError::invalid(
                "WATCHLIST",
                format!("duplicate symbol {}", dup),
            ));
        }

        if !(self.drop_threshold > 0.0 && self.drop_threshold < 1.0) {
            return Err(ConfigError::invalid(
                "DROP_THRESHOLD",
                format!("{} must be a fraction between 0 and 1", self.drop_threshold),
            ));
        }

        if self.consecutive_day_threshold < 1 {
            return Err(ConfigError::invalid(
                "CONSECUTIVE_DAY_THRESHOLD",
                "must be at least 1",
            ));
        }

        if self.drop_lookback_days < 2 {
            return Err(ConfigError::invalid(
                "DROP_LOOKBACK_DAYS",
                "must cover at least 2 trading days",
            ));
        }

        if (self.decline_lookback_days as usize) < self.consecutive_day_threshold + 1 {
            return Err(ConfigError::invalid(
                "DECLINE_LOOKBACK_DAYS",
                format!(
                    "{} days cannot hold a {}-day decline",
                    self.decline_lookback_days, self.consecutive_day_threshold
                ),
            ));
        }

        if self.max_concurrent_fetches < 1 {
            return Err(ConfigError::invalid("MAX_CONCURRENT_FETCHES", "must be at least 1"));
        }

        if self.provider == ProviderKind::Polygon {
            if self.polygon_api_key.is_none() {
                return Err(ConfigError::Missing("POLYGON_API_KEY".into()));
            }
            if self.polygon_rate_limit < 1 {
                return Err(ConfigError::invalid("POLYGON_RATE_LIMIT", "must be at least 1"));
            }
        }

        Ok(())
    }

    /// One fetch per instrument covers both detectors.
    pub fn fetch_lookback_days(&self) -> u32 {
        self.drop_lookback_days.max(self.decline_lookback_days)
    }

    pub fn pacing(&self) -> PacingPolicy {
        PacingPolicy {
            min_interval: Duration::from_millis(self.inter_request_delay_ms),
            max_concurrency: self.max_concurrent_fetches,
        }
    }

    pub fn cycle_timeout(&self) -> Option<Duration> {
        self.cycle_timeout_secs.map(Duration::from_secs)
    }
}
