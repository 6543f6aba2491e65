mod polygon;
mod rate_limiter;
mod yahoo;

#[cfg(test)]
mod fixture;

pub use polygon::PolygonClient;
pub use rate_limiter::RateLimiter;
pub use yahoo::YahooFinanceClient;

use monitor_core::FetchError;

/// Calendar days to request so that `lookback_days` trading days are
/// covered across weekends and a long holiday weekend.
pub(crate) fn calendar_span_days(lookback_days: u32) -> i64 {
    let trading = i64::from(lookback_days.max(1));
    trading * 7 / 5 + 7
}

/// Maps a reqwest failure onto the fetch taxonomy.
pub(crate) fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else if err.is_decode() {
        FetchError::Malformed(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

/// Maps an unsuccessful HTTP status onto the fetch taxonomy.
pub(crate) fn classify_status(status: reqwest::StatusCode, symbol: &str, body: &str) -> FetchError {
    match status.as_u16() {
        404 => FetchError::NotFound(symbol.to_string()),
        429 => FetchError::RateLimited(format!("{}: HTTP 429", symbol)),
        408 | 504 => FetchError::Timeout(format!("{}: HTTP {}", symbol, status)),
        _ => FetchError::Transport(format!("{}: HTTP {}: {}", symbol, status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_span_covers_weekends() {
        assert!(calendar_span_days(5) >= 7);
        assert!(calendar_span_days(10) >= 14);
        assert_eq!(calendar_span_days(0), calendar_span_days(1));
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "XYZ", ""),
            FetchError::NotFound(s) if s == "XYZ"
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "XYZ", ""),
            FetchError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::GATEWAY_TIMEOUT, "XYZ", ""),
            FetchError::Timeout(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, "XYZ", "boom"),
            FetchError::Transport(_)
        ));
    }
}
