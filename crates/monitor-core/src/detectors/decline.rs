use crate::{ConsecutiveDeclineAlert, PriceHistory};

pub const DEFAULT_CONSECUTIVE_DAYS: usize = 3;

/// Flags a history ending in a run of strictly lower closes at least
/// `day_threshold` days long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclineDetector {
    day_threshold: usize,
}

impl DeclineDetector {
    pub fn new(day_threshold: usize) -> Self {
        Self { day_threshold }
    }

    pub fn day_threshold(&self) -> usize {
        self.day_threshold
    }

    /// Length of the strictly decreasing run ending at the newest close.
    /// An unchanged close ends the run.
    pub fn run_length(history: &PriceHistory) -> usize {
        history
            .points()
            .windows(2)
            .rev()
            .take_while(|w| w[1].close < w[0].close)
            .count()
    }

    /// Returns `None` when the history has fewer than `day_threshold + 1`
    /// points. Runs longer than the threshold are reported at full length.
    pub fn evaluate(&self, history: &PriceHistory) -> Option<ConsecutiveDeclineAlert> {
        let points = history.points();
        if points.len() < self.day_threshold + 1 {
            return None;
        }

        let consecutive_days = Self::run_length(history);
        if consecutive_days < self.day_threshold || consecutive_days == 0 {
            return None;
        }

        let current_price = points[points.len() - 1].close;
        let start_price = points[points.len() - 1 - consecutive_days].close;

        Some(ConsecutiveDeclineAlert {
            instrument: history.instrument().clone(),
            consecutive_days,
            current_price,
            start_price,
            total_decline_percent: (current_price - start_price) / start_price * 100.0,
        })
    }
}

impl Default for DeclineDetector {
    fn default() -> Self {
        Self::new(DEFAULT_CONSECUTIVE_DAYS)
    }
}
