use crate::{DailyDropAlert, PriceHistory};

/// 5% single-day drop.
pub const DEFAULT_DROP_THRESHOLD: f64 = 0.05;

/// Flags a history whose last close fell at least `threshold` (a fraction)
/// below the close before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropDetector {
    threshold: f64,
}

impl DropDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns `None` when the history has fewer than two points.
    pub fn evaluate(&self, history: &PriceHistory) -> Option<DailyDropAlert> {
        let points = history.points();
        if points.len() < 2 {
            return None;
        }

        let current_price = points[points.len() - 1].close;
        let previous_close = points[points.len() - 2].close;
        let change = (current_price - previous_close) / previous_close;

        if change > -self.threshold {
            return None;
        }

        Some(DailyDropAlert {
            instrument: history.instrument().clone(),
            change_percent: change * 100.0,
            current_price,
            previous_close,
        })
    }
}

impl Default for DropDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DROP_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Instrument;
    use chrono::NaiveDate;

    fn history(closes: &[f64]) -> PriceHistory {
        PriceHistory::from_closes(
            Instrument::new("TEST").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            closes,
        )
        .unwrap()
    }

    #[test]
    fn test_six_percent_drop_triggers() {
        let alert = DropDetector::default().evaluate(&history(&[100.0, 94.0])).unwrap();

        assert!((alert.change_percent - (-6.0)).abs() < 1e-9);
        assert_eq!(alert.current_price, 94.0);
        assert_eq!(alert.previous_close, 100.0);
        assert_eq!(alert.instrument.symbol(), "TEST");
    }

    #[test]
    fn test_four_percent_drop_is_ignored() {
        assert!(DropDetector::default().evaluate(&history(&[100.0, 96.0])).is_none());
    }

    #[test]
    fn test_drop_exactly_at_threshold_triggers() {
        assert!(DropDetector::default().evaluate(&history(&[100.0, 95.0])).is_some());
    }

    #[test]
    fn test_only_last_two_closes_matter() {
        // Big drop earlier in the window, flat at the end
        let detector = DropDetector::default();
        assert!(detector.evaluate(&history(&[100.0, 80.0, 80.0])).is_none());
        assert!(detector.evaluate(&history(&[80.0, 100.0, 90.0])).is_some());
    }

    #[test]
    fn test_gain_never_triggers() {
        assert!(DropDetector::default().evaluate(&history(&[100.0, 110.0])).is_none());
    }

    #[test]
    fn test_insufficient_data() {
        let detector = DropDetector::default();
        assert!(detector.evaluate(&history(&[100.0])).is_none());
        assert!(detector.evaluate(&history(&[])).is_none());
    }

    #[test]
    fn test_custom_threshold() {
        let detector = DropDetector::new(0.02);
        assert!(detector.evaluate(&history(&[100.0, 97.0])).is_some());
        assert!(detector.evaluate(&history(&[100.0, 99.0])).is_none());
    }
}
