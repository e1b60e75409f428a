//! Balance tier selection.
//!
//! Bonus funds are consumed ahead of the main balance, but only while they
//! cover the full bet and an eligible bonus grant is in force. This is a
//! priority policy: main-tier sufficiency is never checked here, it surfaces
//! at deduction instead.

use crate::games::types::BalanceTier;
use crate::ledger::LedgerClient;
use chrono::Utc;
use std::sync::Arc;

pub struct BalanceSelector {
    ledger: Arc<dyn LedgerClient>,
}

impl BalanceSelector {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Pick the tier funding a wager. Any failed lookup selects the main
    /// tier; a broken bonus query must not block a playable main balance.
    pub async fn select_tier(&self, user_id: &str, bet_amount: f64, token_id: &str) -> BalanceTier {
        let bonus_balance = match self
            .ledger
            .get_balance(user_id, token_id, BalanceTier::Bonus)
            .await
        {
            Ok(balance) => balance,
            Err(e) => {
                tracing::debug!(user_id, %e, "Bonus balance lookup failed; using main tier");
                return BalanceTier::Main;
            }
        };

        if bonus_balance < bet_amount {
            return BalanceTier::Main;
        }

        match self.ledger.get_active_bonus(user_id, token_id).await {
            Ok(Some(bonus)) if bonus.is_usable(Utc::now()) => BalanceTier::Bonus,
            Ok(_) => BalanceTier::Main,
            Err(e) => {
                tracing::debug!(user_id, %e, "Active bonus lookup failed; using main tier");
                BalanceTier::Main
            }
        }
    }
}
