//! Referral commission tracking.
//!
//! Tracking is a side effect of a successful deduction and runs in its own
//! failure domain: the entry is written from a spawned task, errors are
//! logged and never reach the settlement path, and completion is never
//! awaited before the round result returns.

use crate::games::types::BalanceTier;
use crate::ledger::{ReferralLedger, ReferralLedgerEntry};
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReferralTracker {
    sink: Arc<dyn ReferralLedger>,
    enabled: bool,
}

impl ReferralTracker {
    pub fn new(sink: Arc<dyn ReferralLedger>, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    /// Record a commission event for a funded wager. Fire-and-forget.
    pub fn track(&self, user_id: &str, bet_amount: f64, token_id: &str, tier: BalanceTier) {
        if !self.enabled {
            return;
        }

        let entry = ReferralLedgerEntry {
            user_id: user_id.to_string(),
            bet_amount,
            token_id: token_id.to_string(),
            balance_tier: tier,
            timestamp: Utc::now(),
        };

        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.record(entry).await {
                tracing::warn!(%e, "Referral tracking failed; gameplay unaffected");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use std::time::Duration;

    #[tokio::test]
    async fn test_track_records_entry() {
        let ledger = Arc::new(InMemoryLedger::new());
        let tracker = ReferralTracker::new(ledger.clone(), true);

        tracker.track("alice", 10.0, "usdt", BalanceTier::Main);

        // The write happens on a spawned task; give it a beat.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let entries = ledger.referral_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, "alice");
        assert_eq!(entries[0].bet_amount, 10.0);
        assert_eq!(entries[0].balance_tier, BalanceTier::Main);
    }

    #[tokio::test]
    async fn test_disabled_tracker_records_nothing() {
        let ledger = Arc::new(InMemoryLedger::new());
        let tracker = ReferralTracker::new(ledger.clone(), false);

        tracker.track("alice", 10.0, "usdt", BalanceTier::Main);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(ledger.referral_entries().is_empty());
    }

    #[tokio::test]
    async fn test_sink_outage_does_not_propagate() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_offline(true);
        let tracker = ReferralTracker::new(ledger.clone(), true);

        // Must not panic or block the caller.
        tracker.track("alice", 10.0, "usdt", BalanceTier::Bonus);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(ledger.referral_entries().is_empty());
    }
}
