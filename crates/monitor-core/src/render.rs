//! Transport-agnostic rendering of an [`AlertBatch`].
//!
//! Channels receive an [`AlertSummary`] and decide on their own markup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AlertBatch, Instrument, DEFAULT_CONSECUTIVE_DAYS, DEFAULT_DROP_THRESHOLD};

const CHART_BASE_URL: &str = "https://finance.yahoo.com/quote";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    DailyDrops,
    ConsecutiveDeclines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub instrument: Instrument,
    /// Formatted cell values, one per section column.
    pub cells: Vec<String>,
}

impl SummaryRow {
    pub fn chart_url(&self) -> String {
        format!("{}/{}", CHART_BASE_URL, self.instrument.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySection {
    pub kind: SectionKind,
    pub heading: String,
    pub columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<SummarySection>,
}

impl AlertSummary {
    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }

    /// Plain-text rendering for chat webhooks and logs.
    pub fn to_plain_text(&self) -> String {
        let mut out = format!(
            "{} ({} UTC)\n",
            self.title,
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        );
        for section in &self.sections {
            out.push('\n');
            out.push_str(&section.heading);
            out.push('\n');
            for row in &section.rows {
                let fields: Vec<String> = section
                    .columns
                    .iter()
                    .zip(&row.cells)
                    .skip(1)
                    .map(|(col, cell)| format!("{}: {}", col, cell))
                    .collect();
                out.push_str(&format!("- {} | {}\n", row.instrument, fields.join(" | ")));
            }
        }
        out
    }
}

fn price(value: f64) -> String {
    format!("${:.2}", value)
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Thresholds quoted in the section headings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub drop_threshold: f64,
    pub consecutive_days: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            drop_threshold: DEFAULT_DROP_THRESHOLD,
            consecutive_days: DEFAULT_CONSECUTIVE_DAYS,
        }
    }
}

impl Thresholds {
    fn drop_heading(&self) -> String {
        // One decimal at most: 0.05 -> "5", 0.075 -> "7.5"
        let pct = (self.drop_threshold * 1000.0).round() / 10.0;
        format!("Daily Drops (>{}%)", pct)
    }

    fn decline_heading(&self) -> String {
        format!("{}+ Day Consecutive Declines", self.consecutive_days)
    }
}

/// Renders a batch with the default thresholds in the headings.
pub fn render(batch: &AlertBatch) -> AlertSummary {
    render_with(batch, &Thresholds::default())
}

/// Renders a batch into two sections (daily drops, consecutive declines),
/// omitting empty ones. Row order follows the batch.
pub fn render_with(batch: &AlertBatch, thresholds: &Thresholds) -> AlertSummary {
    let mut sections = Vec::new();

    if !batch.daily_drops().is_empty() {
        sections.push(SummarySection {
            kind: SectionKind::DailyDrops,
            heading: thresholds.drop_heading(),
            columns: ["Ticker", "Change %", "Current Price", "Previous Close"]
                .map(String::from)
                .to_vec(),
            rows: batch
                .daily_drops()
                .iter()
                .map(|a| SummaryRow {
                    instrument: a.instrument.clone(),
                    cells: vec![
                        a.instrument.to_string(),
                        percent(a.change_percent),
                        price(a.current_price),
                        price(a.previous_close),
                    ],
                })
                .collect(),
        });
    }

    if !batch.consecutive_declines().is_empty() {
        sections.push(SummarySection {
            kind: SectionKind::ConsecutiveDeclines,
            heading: thresholds.decline_heading(),
            columns: [
                "Ticker",
                "Days Down",
                "Current Price",
                "Start Price",
                "Total Decline %",
            ]
            .map(String::from)
            .to_vec(),
            rows: batch
                .consecutive_declines()
                .iter()
                .map(|a| SummaryRow {
                    instrument: a.instrument.clone(),
                    cells: vec![
                        a.instrument.to_string(),
                        a.consecutive_days.to_string(),
                        price(a.current_price),
                        price(a.start_price),
                        percent(a.total_decline_percent),
                    ],
                })
                .collect(),
        });
    }

    AlertSummary {
        title: format!(
            "Stock Alerts - {} drops, {} declines",
            batch.daily_drops().len(),
            batch.consecutive_declines().len()
        ),
        generated_at: batch.generated_at(),
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConsecutiveDeclineAlert, DailyDropAlert};

    fn drop_alert(symbol: &str, change: f64) -> DailyDropAlert {
        DailyDropAlert {
            instrument: Instrument::new(symbol).unwrap(),
            change_percent: change,
            current_price: 94.0,
            previous_close: 100.0,
        }
    }

    fn decline_alert(symbol: &str) -> ConsecutiveDeclineAlert {
        ConsecutiveDeclineAlert {
            instrument: Instrument::new(symbol).unwrap(),
            consecutive_days: 4,
            current_price: 96.5,
            start_price: 100.0,
            total_decline_percent: -3.5,
        }
    }

    #[test]
    fn test_render_both_sections() {
        let batch = AlertBatch::new(
            vec![drop_alert("AMD", -6.0), drop_alert("INTC", -7.25)],
            vec![decline_alert("SNAP")],
            Utc::now(),
        );

        let summary = render(&batch);

        assert_eq!(summary.title, "Stock Alerts - 2 drops, 1 declines");
        assert_eq!(summary.sections.len(), 2);
        assert_eq!(summary.row_count(), 3);

        let drops = &summary.sections[0];
        assert_eq!(drops.kind, SectionKind::DailyDrops);
        assert_eq!(drops.rows[0].cells, vec!["AMD", "-6.00%", "$94.00", "$100.00"]);
        assert_eq!(drops.rows[1].instrument.symbol(), "INTC");

        let declines = &summary.sections[1];
        assert_eq!(declines.kind, SectionKind::ConsecutiveDeclines);
        assert_eq!(declines.rows[0].cells[1], "4");
        assert_eq!(declines.rows[0].cells[4], "-3.50%");
        assert_eq!(declines.columns.len(), declines.rows[0].cells.len());
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let batch = AlertBatch::new(Vec::new(), vec![decline_alert("SNAP")], Utc::now());
        let summary = render(&batch);

        assert_eq!(summary.sections.len(), 1);
        assert_eq!(summary.sections[0].kind, SectionKind::ConsecutiveDeclines);
    }

    #[test]
    fn test_plain_text_and_chart_link() {
        let batch = AlertBatch::new(vec![drop_alert("AMD", -6.0)], Vec::new(), Utc::now());
        let summary = render(&batch);
        let text = summary.to_plain_text();

        assert!(text.starts_with("Stock Alerts - 1 drops, 0 declines"));
        assert!(text.contains("- AMD | Change %: -6.00% | Current Price: $94.00"));
        assert_eq!(
            summary.sections[0].rows[0].chart_url(),
            "https://finance.yahoo.com/quote/AMD"
        );
    }

    #[test]
    fn test_headings_quote_thresholds() {
        let batch = AlertBatch::new(
            vec![drop_alert("AMD", -8.0)],
            vec![decline_alert("SNAP")],
            Utc::now(),
        );

        let summary = render(&batch);
        assert_eq!(summary.sections[0].heading, "Daily Drops (>5%)");
        assert_eq!(summary.sections[1].heading, "3+ Day Consecutive Declines");

        let custom = render_with(
            &batch,
            &Thresholds {
                drop_threshold: 0.075,
                consecutive_days: 4,
            },
        );
        assert_eq!(custom.sections[0].heading, "Daily Drops (>7.5%)");
        assert_eq!(custom.sections[1].heading, "4+ Day Consecutive Declines");
    }
}
