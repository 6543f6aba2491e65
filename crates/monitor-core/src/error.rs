use thiserror::Error;

/// Per-instrument failure while fetching a price history.
///
/// The cycle treats every kind the same way (log and skip the instrument),
/// the variants exist so operators can tell them apart.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Symbol not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Short, stable label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NotFound(_) => "not_found",
            FetchError::RateLimited(_) => "rate_limited",
            FetchError::Timeout(_) => "timeout",
            FetchError::Malformed(_) => "malformed",
            FetchError::Transport(_) => "transport",
        }
    }
}

/// Invalid or missing startup configuration. Always fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid instrument symbol: {0:?}")]
    InvalidSymbol(String),
}

impl ConfigError {
    pub fn invalid(var: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that abort a whole monitoring cycle.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cycle cancelled: {0}")]
    Cancelled(String),
}
