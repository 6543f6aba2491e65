use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use monitor_core::{FetchError, Instrument, MarketDataProvider, PriceHistory, PricePoint};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{calendar_span_days, classify_reqwest_error, classify_status};

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Daily closes from the public Yahoo Finance chart endpoint.
#[derive(Clone)]
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
}

impl YahooFinanceClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: CHART_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    async fn fetch_history(
        &self,
        instrument: &Instrument,
        lookback_days: u32,
    ) -> Result<PriceHistory, FetchError> {
        let to = Utc::now();
        let from = to - chrono::Duration::days(calendar_span_days(lookback_days));
        let url = format!("{}/{}", self.base_url, instrument.symbol());

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", from.timestamp().to_string()),
                ("period2", to.timestamp().to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        // Unknown symbols usually come back as 404 with a JSON error body;
        // anything else on a 404 (HTML, empty) is still NotFound
        if status == StatusCode::NOT_FOUND {
            return Err(match parse_chart(instrument, &body) {
                Err(e @ FetchError::NotFound(_)) => e,
                _ => classify_status(status, instrument.symbol(), &body),
            });
        }
        if !status.is_success() {
            return Err(classify_status(status, instrument.symbol(), &body));
        }

        let history = parse_chart(instrument, &body)?;
        Ok(history.latest(lookback_days as usize))
    }

    fn name(&self) -> &str {
        "yahoo-finance"
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Parses a chart response body into a history keyed by exchange-local date.
///
/// Null closes are skipped. When two bars share a date (the live intraday
/// bar next to the finished daily bar) the later one wins.
fn parse_chart(instrument: &Instrument, body: &str) -> Result<PriceHistory, FetchError> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("{}: {}", instrument, e)))?;

    if let Some(err) = response.chart.error {
        return Err(if err.code.eq_ignore_ascii_case("Not Found") {
            FetchError::NotFound(format!("{}: {}", instrument, err.description))
        } else {
            FetchError::Malformed(format!("{}: {} {}", instrument, err.code, err.description))
        });
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::NotFound(format!("{}: no chart data", instrument)))?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    if closes.len() != result.timestamp.len() {
        return Err(FetchError::Malformed(format!(
            "{}: {} timestamps but {} closes",
            instrument,
            result.timestamp.len(),
            closes.len()
        )));
    }

    let offset = FixedOffset::east_opt(result.meta.gmtoffset)
        .ok_or_else(|| FetchError::Malformed(format!("{}: bad gmtoffset", instrument)))?;

    let mut points: Vec<PricePoint> = Vec::with_capacity(closes.len());
    for (ts, close) in result.timestamp.iter().zip(closes) {
        let Some(close) = close else { continue };
        let date = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| FetchError::Malformed(format!("{}: bad timestamp {}", instrument, ts)))?
            .with_timezone(&offset)
            .date_naive();

        match points.last_mut() {
            Some(last) if last.date == date => last.close = close,
            _ => points.push(PricePoint::new(date, close)),
        }
    }

    if points.is_empty() {
        return Err(FetchError::NotFound(format!("{}: no closing prices", instrument)));
    }

    PriceHistory::new(instrument.clone(), points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{direct_client, FixtureServer};
    use chrono::NaiveDate;

    fn aapl() -> Instrument {
        Instrument::new("AAPL").unwrap()
    }

    // Three sessions, 9:30 ET opens, New York offset -18000
    const CHART_OK: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "AAPL", "gmtoffset": -18000, "exchangeTimezoneName": "America/New_York"},
                "timestamp": [1704724200, 1704810600, 1704897000],
                "indicators": {"quote": [{"close": [185.56, null, 186.19], "open": [182.09, 183.92, 184.35]}]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart() {
        let history = parse_chart(&aapl(), CHART_OK).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(
            history.points()[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
        assert_eq!(
            history.points()[1].date,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
        );
        assert_eq!(history.latest_close(), Some(186.19));
    }

    #[test]
    fn test_parse_chart_same_day_bars_keep_latest() {
        let body = r#"{"chart": {"result": [{
            "meta": {"gmtoffset": -18000},
            "timestamp": [1704724200, 1704745800],
            "indicators": {"quote": [{"close": [185.0, 184.0]}]}
        }], "error": null}}"#;

        let history = parse_chart(&aapl(), body).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest_close(), Some(184.0));
    }

    #[test]
    fn test_parse_chart_not_found() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        assert!(matches!(
            parse_chart(&aapl(), body),
            Err(FetchError::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_chart_mismatched_arrays() {
        let body = r#"{"chart": {"result": [{
            "meta": {"gmtoffset": 0},
            "timestamp": [1704724200, 1704810600],
            "indicators": {"quote": [{"close": [185.0]}]}
        }], "error": null}}"#;
        assert!(matches!(
            parse_chart(&aapl(), body),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_chart_garbage() {
        assert!(matches!(
            parse_chart(&aapl(), "<html>oops</html>"),
            Err(FetchError::Malformed(_))
        ));
    }

    fn client(server: &FixtureServer) -> YahooFinanceClient {
        let mut client = YahooFinanceClient::new().with_base_url(server.base_url.clone());
        client.client = direct_client();
        client
    }

    #[tokio::test]
    async fn test_fetch_trims_to_lookback() {
        let timestamps: Vec<String> = (0..6).map(|k| (1704724200 + k * 86400).to_string()).collect();
        let body = format!(
            r#"{{"chart": {{"result": [{{
                "meta": {{"gmtoffset": -18000}},
                "timestamp": [{}],
                "indicators": {{"quote": [{{"close": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]}}]}}
            }}], "error": null}}}}"#,
            timestamps.join(",")
        );
        let server = FixtureServer::start("200 OK", body).await;

        let history = client(&server).fetch_history(&aapl(), 3).await.unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history.points()[0].close, 4.0);
        assert_eq!(history.latest_close(), Some(6.0));
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_fetch_html_404_is_not_found() {
        let server = FixtureServer::start("404 Not Found", "<html>Not Found</html>").await;

        let result = client(&server)
            .fetch_history(&Instrument::new("ZZZZ").unwrap(), 5)
            .await;

        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_json_404_keeps_description() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let server = FixtureServer::start("404 Not Found", body).await;

        let result = client(&server).fetch_history(&aapl(), 5).await;

        assert!(matches!(result, Err(FetchError::NotFound(ref msg)) if msg.contains("delisted")));
    }

    #[tokio::test]
    async fn test_fetch_429_is_rate_limited() {
        let server = FixtureServer::start("429 Too Many Requests", "Too Many Requests").await;

        let result = client(&server).fetch_history(&aapl(), 5).await;

        assert!(matches!(result, Err(FetchError::RateLimited(_))));
    }
}
