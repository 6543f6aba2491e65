use async_trait::async_trait;

use crate::{FetchError, Instrument, PriceHistory};

/// Source of daily price histories.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch up to `lookback_days` of the most recent daily closes.
    async fn fetch_history(
        &self,
        instrument: &Instrument,
        lookback_days: u32,
    ) -> Result<PriceHistory, FetchError>;

    fn name(&self) -> &str;
}
