//! Aggregate wagering statistics.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Running totals across settled rounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatsSnapshot {
    pub total_wagered: f64,
    pub total_paid_out: f64,
    pub round_count: u64,
    pub win_count: u64,
}

impl StatsSnapshot {
    /// Share of wagered funds kept by the house so far.
    pub fn house_edge(&self) -> f64 {
        if self.total_wagered == 0.0 {
            return 0.0;
        }
        (self.total_wagered - self.total_paid_out) / self.total_wagered
    }
}

/// Thread-safe stats accumulator updated after settlement.
pub struct WagerStats {
    inner: RwLock<StatsSnapshot>,
}

impl WagerStats {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StatsSnapshot::default()),
        }
    }

    pub fn record_round(&self, bet_amount: f64, win_amount: f64) {
        if let Ok(mut stats) = self.inner.write() {
            stats.total_wagered += bet_amount;
            stats.total_paid_out += win_amount;
            stats.round_count += 1;
            if win_amount > 0.0 {
                stats.win_count += 1;
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.read().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for WagerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_accumulates() {
        let stats = WagerStats::new();
        stats.record_round(10.0, 0.0);
        stats.record_round(5.0, 28.0);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_wagered, 15.0);
        assert_eq!(snapshot.total_paid_out, 28.0);
        assert_eq!(snapshot.round_count, 2);
        assert_eq!(snapshot.win_count, 1);
    }

    #[test]
    fn test_house_edge() {
        let stats = WagerStats::new();
        assert_eq!(stats.snapshot().house_edge(), 0.0);

        stats.record_round(100.0, 60.0);
        let edge = stats.snapshot().house_edge();
        assert!((edge - 0.4).abs() < f64::EPSILON);
    }
}
