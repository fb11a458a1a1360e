//! crates/agent_metrics_core/src/change.rs
//!
//! Percentage change between two totals, with a fixed policy for a zero baseline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

/// A change from a previous value to `value`.
///
/// `percentage` is always the magnitude; the sign lives in `trend`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub value: f64,
    pub percentage: u64,
    pub trend: Trend,
}

impl Change {
    /// The signed percentage, recombined from `trend` and `percentage`.
    pub fn signed_percentage(&self) -> i64 {
        let magnitude = self.percentage as i64;
        match self.trend {
            Trend::Down => -magnitude,
            _ => magnitude,
        }
    }
}

/// Computes the change from `previous` to `current`.
///
/// A zero baseline never divides: growth from zero reports 100% up, zero to zero is
/// neutral.
pub fn percent_change(current: f64, previous: f64) -> Change {
    if previous == 0.0 {
        let grew = current > 0.0;
        return Change {
            value: current,
            percentage: if grew { 100 } else { 0 },
            trend: if grew { Trend::Up } else { Trend::Neutral },
        };
    }

    let rounded = (((current - previous) / previous) * 100.0).round();
    let trend = if rounded > 0.0 {
        Trend::Up
    } else if rounded < 0.0 {
        Trend::Down
    } else {
        Trend::Neutral
    };

    Change {
        value: current,
        percentage: rounded.abs() as u64,
        trend,
    }
}

/// First-versus-last change over a series. Fewer than two points is neutral.
pub fn series_trend(values: &[f64]) -> Change {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() >= 2 => percent_change(*last, *first),
        _ => Change {
            value: values.last().copied().unwrap_or(0.0),
            percentage: 0,
            trend: Trend::Neutral,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_baseline_policy() {
        let flat = percent_change(0.0, 0.0);
        assert_eq!(flat.percentage, 0);
        assert_eq!(flat.trend, Trend::Neutral);

        let from_zero = percent_change(5.0, 0.0);
        assert_eq!(from_zero.percentage, 100);
        assert_eq!(from_zero.trend, Trend::Up);
        assert_eq!(from_zero.value, 5.0);
    }

    #[test]
    fn percentage_is_a_magnitude() {
        let down = percent_change(50.0, 100.0);
        assert_eq!(down.percentage, 50);
        assert_eq!(down.trend, Trend::Down);
        assert_eq!(down.signed_percentage(), -50);

        let up = percent_change(150.0, 100.0);
        assert_eq!(up.percentage, 50);
        assert_eq!(up.trend, Trend::Up);
    }

    #[test]
    fn rounding_to_zero_is_neutral() {
        let tiny = percent_change(1001.0, 1000.0);
        assert_eq!(tiny.percentage, 0);
        assert_eq!(tiny.trend, Trend::Neutral);

        let third = percent_change(4.0, 3.0);
        assert_eq!(third.percentage, 33);
    }

    #[test]
    fn series_compares_first_and_last() {
        assert_eq!(series_trend(&[10.0, 3.0, 15.0]).percentage, 50);
        assert_eq!(series_trend(&[0.0, 0.0, 4.0]).trend, Trend::Up);
        assert_eq!(series_trend(&[7.0]).trend, Trend::Neutral);
        assert_eq!(series_trend(&[]).value, 0.0);
    }
}
