//! Display projection of an [`AnalysisResult`]. Pure: no I/O, no mutation.

use std::fmt;

use serde::Serialize;

use crate::contract::AnalysisResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

impl TrendDirection {
    /// Strictly positive slopes are rising; a flat slope counts as `Down`.
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        }
    }

    fn arrow(self) -> &'static str {
        match self {
            TrendDirection::Up => "↑",
            TrendDirection::Down => "↓",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub title: &'static str,
    pub value: String,
    /// Violation badge; set when the card reports at least one exceedance.
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendIndicator {
    pub direction: TrendDirection,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViolationRow {
    pub period: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub average_kld: MetricCard,
    pub average_kly: MetricCard,
    pub daily_violations: MetricCard,
    pub annual_violations: MetricCard,
    pub trend: TrendIndicator,
    pub daily_violation_rows: Vec<ViolationRow>,
    pub annual_violation_rows: Vec<ViolationRow>,
}

impl ResultView {
    pub fn cards(&self) -> [&MetricCard; 4] {
        [
            &self.average_kld,
            &self.average_kly,
            &self.daily_violations,
            &self.annual_violations,
        ]
    }

    /// Render with the violation detail tables appended.
    pub fn detailed(&self) -> Detailed<'_> {
        Detailed(self)
    }
}

pub fn present(result: &AnalysisResult) -> ResultView {
    ResultView {
        average_kld: MetricCard {
            title: "Average KLD",
            value: format!("{:.2}", result.average_kld),
            flagged: false,
        },
        average_kly: MetricCard {
            title: "Average KLY",
            value: format!("{:.2}", result.average_kly),
            flagged: false,
        },
        daily_violations: violation_card("Daily Violations", result.daily_exceed_count),
        annual_violations: violation_card("Annual Violations", result.annual_exceed_count),
        trend: TrendIndicator {
            direction: TrendDirection::from_slope(result.trend_slope),
            value: format!("{:.4}", result.trend_slope),
        },
        daily_violation_rows: result
            .daily_violation_details
            .iter()
            .map(|v| ViolationRow {
                period: v.date.format("%Y-%m-%d").to_string(),
                value: format!("{:.2}", v.value),
            })
            .collect(),
        annual_violation_rows: result
            .annual_violation_details
            .iter()
            .map(|v| ViolationRow {
                period: v.year.to_string(),
                value: format!("{:.2}", v.total),
            })
            .collect(),
    }
}

fn violation_card(title: &'static str, count: u64) -> MetricCard {
    MetricCard {
        title,
        value: count.to_string(),
        flagged: count > 0,
    }
}

impl fmt::Display for MetricCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let badge = if self.flagged { "  [VIOLATION]" } else { "" };
        write!(f, "{:<18} {:>14}{}", self.title, self.value, badge)
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for card in self.cards() {
            writeln!(f, "{card}")?;
        }
        write!(
            f,
            "{:<18} {:>14}  {}",
            "Trend",
            self.trend.value,
            self.trend.direction.arrow()
        )
    }
}

pub struct Detailed<'a>(&'a ResultView);

impl fmt::Display for Detailed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        write_rows(f, "Daily violations", "Date", &self.0.daily_violation_rows)?;
        write_rows(f, "Annual violations", "Year", &self.0.annual_violation_rows)
    }
}

fn write_rows(
    f: &mut fmt::Formatter<'_>,
    heading: &str,
    period_label: &str,
    rows: &[ViolationRow],
) -> fmt::Result {
    if rows.is_empty() {
        return Ok(());
    }
    write!(f, "\n\n{heading}\n{:<12} {:>16}", period_label, "Value")?;
    for row in rows {
        write!(f, "\n{:<12} {:>16}", row.period, row.value)?;
    }
    Ok(())
}
