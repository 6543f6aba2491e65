use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use monitor_core::{FetchError, Instrument, MarketDataProvider, PriceHistory, PricePoint};
use reqwest::Client;
use serde::Deserialize;

use crate::{calendar_span_days, classify_reqwest_error, classify_status, RateLimiter};

const BASE_URL: &str = "https://api.polygon.io";
const MAX_ATTEMPTS: u32 = 3;

/// Daily aggregates from Polygon.io.
#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter,
    retry_wait: Duration,
}

impl PolygonClient {
    /// `rate_limit` is requests per minute; the free tier allows 5.
    pub fn new(api_key: String, rate_limit: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            base_url: BASE_URL.to_string(),
            rate_limiter: RateLimiter::per_minute(rate_limit),
            retry_wait: Duration::from_secs(15),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        symbol: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FetchError> {
        let request = builder
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        for attempt in 0..MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| FetchError::Transport("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(classify_reqwest_error)?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            tracing::warn!(
                "Polygon 429 rate limited for {}, waiting {}s before retry {}/{}",
                symbol,
                self.retry_wait.as_secs(),
                attempt + 1,
                MAX_ATTEMPTS
            );
            tokio::time::sleep(self.retry_wait).await;
        }

        Err(FetchError::RateLimited(format!(
            "{}: rate limited by Polygon after {} retries",
            symbol, MAX_ATTEMPTS
        )))
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    async fn fetch_history(
        &self,
        instrument: &Instrument,
        lookback_days: u32,
    ) -> Result<PriceHistory, FetchError> {
        let to = Utc::now();
        let from = to - chrono::Duration::days(calendar_span_days(lookback_days));
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.base_url,
            instrument.symbol(),
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(
                instrument.symbol(),
                self.client.get(&url).query(&[
                    ("apiKey", self.api_key.as_str()),
                    ("adjusted", "true"),
                    ("sort", "asc"),
                ]),
            )
            .await?;

        let status = response.status();
        let body = response.text().await.map_err(classify_reqwest_error)?;
        if !status.is_success() {
            return Err(classify_status(status, instrument.symbol(), &body));
        }

        let history = parse_aggregates(instrument, &body)?;
        Ok(history.latest(lookback_days as usize))
    }

    fn name(&self) -> &str {
        "polygon"
    }
}

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Option<Vec<AggregateResult>>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    /// Bar start, Unix milliseconds.
    t: i64,
    c: f64,
}

/// Daily bars are stamped at midnight New York time, so the exchange date is
/// taken in that zone.
fn parse_aggregates(instrument: &Instrument, body: &str) -> Result<PriceHistory, FetchError> {
    let response: AggregateResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("{}: {}", instrument, e)))?;

    let results = response.results.unwrap_or_default();
    if results.is_empty() {
        return Err(FetchError::NotFound(format!("{}: no aggregates", instrument)));
    }

    let points = results
        .into_iter()
        .map(|r| {
            let date = DateTime::from_timestamp_millis(r.t)
                .ok_or_else(|| {
                    FetchError::Malformed(format!("{}: bad timestamp {}", instrument, r.t))
                })?
                .with_timezone(&chrono_tz::America::New_York)
                .date_naive();
            Ok(PricePoint::new(date, r.c))
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    PriceHistory::new(instrument.clone(), points)
}
