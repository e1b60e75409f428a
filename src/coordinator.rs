//! Wager settlement coordinator.
//!
//! One coordinator invocation settles one round:
//! `Init -> Deducted -> ResultComputed -> {Credited | NoCredit} ->
//! HistoryRecorded -> Done`, with `Aborted` reachable until funds have
//! moved. The deduction is the only step that can abort a round; everything
//! after it settles locally, and failures of the credit, history, and
//! referral side effects are absorbed and logged rather than unwinding the
//! round. Double-spend protection lives in the ledger itself; concurrent
//! rounds for one user are independent invocations here.

use crate::balance::BalanceSelector;
use crate::config::PlinqConfig;
use crate::errors::WagerError;
use crate::fairness::{self, SeedPair};
use crate::games::engine::OutcomeEngine;
use crate::games::payout::PayoutTables;
use crate::games::types::{
    BalanceTier, GameRound, PlaceBetRequest, RoundParams, RoundReceipt, RoundState,
};
use crate::history::RoundHistoryStore;
use crate::ledger::{CreditRequest, DebitRequest, LedgerClient, ReferralLedger};
use crate::referral::ReferralTracker;
use crate::stats::{StatsSnapshot, WagerStats};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct WagerCoordinator {
    ledger: Arc<dyn LedgerClient>,
    selector: BalanceSelector,
    engine: OutcomeEngine,
    referral: ReferralTracker,
    history: Option<Arc<dyn RoundHistoryStore>>,
    stats: Arc<WagerStats>,
    config: PlinqConfig,
    nonce: AtomicU64,
}

impl WagerCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        referral_sink: Arc<dyn ReferralLedger>,
        history: Option<Arc<dyn RoundHistoryStore>>,
        config: PlinqConfig,
    ) -> Self {
        let engine = OutcomeEngine::new(PayoutTables::with_overrides(config.payout_overrides()));
        let selector = BalanceSelector::new(ledger.clone());
        let referral = ReferralTracker::new(referral_sink, config.features.referral_enabled);
        let history = if config.features.history_enabled {
            history
        } else {
            None
        };

        Self {
            ledger,
            selector,
            engine,
            referral,
            history,
            stats: Arc::new(WagerStats::new()),
            config,
            nonce: AtomicU64::new(1),
        }
    }

    /// Settle one wager end to end.
    pub async fn place_bet(&self, request: PlaceBetRequest) -> Result<RoundReceipt, WagerError> {
        self.validate(&request)?;

        let client_seed = match &request.client_seed {
            Some(seed) => {
                fairness::validate_client_seed(seed)?;
                seed.clone()
            }
            None => fairness::random_client_seed(),
        };

        let round_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let params = RoundParams::new(request.risk.clone(), request.rows);

        let tier = self
            .selector
            .select_tier(&request.user_id, request.bet_amount, &request.token_id)
            .await;

        // Commit before any funds move so the proof predates the outcome.
        let revealed = fairness::commit();
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            round_id = %round_id,
            state = ?RoundState::Init,
            user_id = %request.user_id,
            %tier,
            commitment = %revealed.commitment,
            "Wager accepted; deducting stake"
        );

        let deduct_timeout = Duration::from_millis(self.config.ledger.deduct_timeout_ms);
        let deduct = DebitRequest {
            user_id: request.user_id.clone(),
            token_id: request.token_id.clone(),
            tier,
            amount: request.bet_amount,
            reference: round_id.clone(),
        };

        let receipt = match tokio::time::timeout(deduct_timeout, self.ledger.deduct(deduct)).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                tracing::warn!(round_id = %round_id, state = ?RoundState::Aborted, %e, "Ledger unreachable");
                return Err(WagerError::LedgerUnavailable(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(round_id = %round_id, state = ?RoundState::Aborted, "Deduct timed out");
                return Err(WagerError::LedgerTimeout {
                    operation: "deduct",
                    timeout_ms: self.config.ledger.deduct_timeout_ms,
                });
            }
        };

        if !receipt.success {
            tracing::debug!(
                round_id = %round_id,
                state = ?RoundState::Aborted,
                error = receipt.error.as_deref().unwrap_or("rejected"),
                "Deduction rejected"
            );
            return Err(WagerError::InsufficientFunds { tier });
        }

        tracing::debug!(round_id = %round_id, state = ?RoundState::Deducted, "Stake deducted");

        // Funds moved; the round settles from here no matter what. Commission
        // tracking fires for every funded wager, win or lose.
        self.referral
            .track(&request.user_id, request.bet_amount, &request.token_id, tier);

        let slots = self.engine.slot_count(&params);
        let draw = fairness::draw(&revealed.server_seed, &client_seed, nonce, slots)?;
        let outcome = self.engine.resolve(&params, draw);

        tracing::debug!(
            round_id = %round_id,
            state = ?RoundState::ResultComputed,
            draw,
            multiplier = outcome.multiplier,
            class = ?outcome.class,
            "Result computed"
        );

        let win_amount = if outcome.multiplier > 1.0 {
            request.bet_amount * outcome.multiplier
        } else {
            0.0
        };

        let state = if win_amount > 0.0 {
            self.credit_winnings(&request, tier, win_amount, &round_id).await;
            RoundState::Credited
        } else {
            RoundState::NoCredit
        };

        let mut round = GameRound {
            round_id,
            user_id: request.user_id.clone(),
            token_id: request.token_id.clone(),
            bet_amount: request.bet_amount,
            params,
            seeds: SeedPair {
                server_seed: revealed.server_seed,
                client_seed,
                nonce,
            },
            commitment: revealed.commitment,
            draw,
            multiplier: outcome.multiplier,
            win_amount,
            result_path: outcome.path,
            class: outcome.class,
            balance_tier: tier,
            state,
            created_at,
            settled_at: Some(Utc::now()),
        };

        // The persisted snapshot carries the settlement state (credited or
        // not); the in-flight copy advances through the recording states.
        if let Some(history) = &self.history {
            match history.save(round.clone()).await {
                Ok(()) => round.state = RoundState::HistoryRecorded,
                Err(e) => {
                    tracing::warn!(round_id = %round.round_id, %e, "History write failed; round already settled");
                }
            }
        }
        round.state = RoundState::Done;

        if self.config.features.stats_enabled {
            self.stats.record_round(round.bet_amount, round.win_amount);
        }

        Ok(RoundReceipt::from_round(&round))
    }

    /// Credit winnings to the tier the stake came from. A failure here is a
    /// consistency gap, not a round failure: the receipt still reports the
    /// win and the round reference lets a reconciliation pass retry the
    /// credit idempotently.
    async fn credit_winnings(
        &self,
        request: &PlaceBetRequest,
        tier: BalanceTier,
        win_amount: f64,
        round_id: &str,
    ) {
        let credit_timeout = Duration::from_millis(self.config.ledger.credit_timeout_ms);
        let credit = CreditRequest {
            user_id: request.user_id.clone(),
            token_id: request.token_id.clone(),
            tier,
            amount: win_amount,
            reference: round_id.to_string(),
        };

        match tokio::time::timeout(credit_timeout, self.ledger.credit(credit)).await {
            Ok(Ok(receipt)) if receipt.success => {
                tracing::debug!(round_id, win_amount, %tier, "Winnings credited");
            }
            Ok(Ok(receipt)) => {
                tracing::warn!(
                    round_id,
                    win_amount,
                    error = receipt.error.as_deref().unwrap_or("rejected"),
                    "Credit rejected; needs reconciliation"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(round_id, win_amount, %e, "Credit failed; needs reconciliation");
            }
            Err(_) => {
                tracing::warn!(round_id, win_amount, "Credit timed out; needs reconciliation");
            }
        }
    }

    fn validate(&self, request: &PlaceBetRequest) -> Result<(), WagerError> {
        if request.user_id.is_empty() {
            return Err(WagerError::InvalidParameters("user id is required".to_string()));
        }
        if request.token_id.is_empty() {
            return Err(WagerError::InvalidParameters("token id is required".to_string()));
        }
        if request.risk.is_empty() {
            return Err(WagerError::InvalidParameters("risk tier is required".to_string()));
        }
        if !request.bet_amount.is_finite() || request.bet_amount < self.config.betting.min_bet {
            return Err(WagerError::InvalidParameters(format!(
                "bet amount must be at least {}",
                self.config.betting.min_bet
            )));
        }
        if request.bet_amount > self.config.betting.max_bet {
            return Err(WagerError::InvalidParameters(format!(
                "bet amount exceeds maximum {}",
                self.config.betting.max_bet
            )));
        }
        if request.rows < self.config.betting.min_rows || request.rows > self.config.betting.max_rows
        {
            return Err(WagerError::InvalidParameters(format!(
                "row count must be between {} and {}",
                self.config.betting.min_rows, self.config.betting.max_rows
            )));
        }
        Ok(())
    }

    /// Recent rounds for a user, newest first. Empty without a history store.
    pub async fn round_history(&self, user_id: &str, limit: usize) -> Vec<GameRound> {
        let Some(history) = &self.history else {
            return Vec::new();
        };

        match history.list_by_user(user_id, limit).await {
            Ok(rounds) => rounds,
            Err(e) => {
                tracing::warn!(user_id, %e, "History read failed");
                Vec::new()
            }
        }
    }

    pub async fn round_by_id(&self, round_id: &str) -> Option<GameRound> {
        let history = self.history.as_ref()?;
        match history.get_by_id(round_id).await {
            Ok(round) => round,
            Err(e) => {
                tracing::warn!(round_id, %e, "History read failed");
                None
            }
        }
    }

    /// Recompute a settled round's commitment and draw against its stored
    /// proof material.
    pub fn verify_round(&self, round: &GameRound) -> Result<(), fairness::FairnessError> {
        let slots = self.engine.slot_count(&round.params);
        fairness::audit(&round.seeds, slots, &round.commitment, round.draw)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, FeatureConfig, LedgerConfig, PayoutTableConfig};
    use crate::games::types::{BalanceTier, OutcomeClass};
    use crate::history::InMemoryHistoryStore;
    use crate::ledger::{ActiveBonus, InMemoryLedger};
    use chrono::Duration as ChronoDuration;

    fn request(user: &str, bet: f64, risk: &str, rows: u8) -> PlaceBetRequest {
        PlaceBetRequest {
            user_id: user.to_string(),
            token_id: "usdt".to_string(),
            bet_amount: bet,
            risk: risk.to_string(),
            rows,
            client_seed: Some("lucky".to_string()),
        }
    }

    fn always_win_config() -> PlinqConfig {
        // Every slot pays 2x: any draw credits.
        ConfigBuilder::new()
            .payout_table(PayoutTableConfig {
                risk: "high".to_string(),
                rows: 8,
                multipliers: vec![2.0; 9],
            })
            .build()
    }

    fn always_lose_config() -> PlinqConfig {
        ConfigBuilder::new()
            .payout_table(PayoutTableConfig {
                risk: "high".to_string(),
                rows: 8,
                multipliers: vec![0.5; 9],
            })
            .build()
    }

    fn coordinator(ledger: Arc<InMemoryLedger>, config: PlinqConfig) -> WagerCoordinator {
        WagerCoordinator::new(
            ledger.clone(),
            ledger,
            Some(Arc::new(InMemoryHistoryStore::new())),
            config,
        )
    }

    #[tokio::test]
    async fn test_losing_round_deducts_without_credit() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        let coordinator = coordinator(ledger.clone(), always_lose_config());

        let receipt = coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .expect("round settles");

        assert_eq!(receipt.class, OutcomeClass::Loss);
        assert_eq!(receipt.win_amount, 0.0);
        assert_eq!(receipt.multiplier, 0.5);
        assert_eq!(ledger.balance_of("alice", "usdt", BalanceTier::Main), 90.0);

        let round = coordinator
            .round_by_id(&receipt.round_id)
            .await
            .expect("round persisted");
        assert_eq!(round.state, RoundState::NoCredit);
    }

    #[tokio::test]
    async fn test_winning_round_credits_same_tier() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        let coordinator = coordinator(ledger.clone(), always_win_config());

        let receipt = coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .expect("round settles");

        assert_eq!(receipt.class, OutcomeClass::Win);
        assert_eq!(receipt.win_amount, 20.0);
        assert_eq!(receipt.balance_tier, BalanceTier::Main);
        assert_eq!(ledger.balance_of("alice", "usdt", BalanceTier::Main), 110.0);
    }

    #[tokio::test]
    async fn test_bonus_round_stays_on_bonus_tier() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        ledger.set_balance("alice", "usdt", BalanceTier::Bonus, 50.0);
        ledger.grant_bonus(ActiveBonus {
            user_id: "alice".to_string(),
            token_id: "usdt".to_string(),
            is_active: true,
            is_completed: false,
            expires_at: Utc::now() + ChronoDuration::hours(1),
        });
        let coordinator = coordinator(ledger.clone(), always_win_config());

        let receipt = coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .expect("round settles");

        assert_eq!(receipt.balance_tier, BalanceTier::Bonus);
        // Deducted 10, credited 20, all on the bonus tier.
        assert_eq!(ledger.balance_of("alice", "usdt", BalanceTier::Bonus), 60.0);
        assert_eq!(ledger.balance_of("alice", "usdt", BalanceTier::Main), 100.0);
    }

    #[tokio::test]
    async fn test_win_loss_consistency_over_many_rounds() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 10_000.0);
        let coordinator = coordinator(ledger.clone(), PlinqConfig::default());

        let mut expected = 10_000.0;
        for _ in 0..50 {
            let receipt = coordinator
                .place_bet(request("alice", 10.0, "high", 8))
                .await
                .expect("round settles");

            expected -= 10.0;
            if receipt.multiplier > 1.0 {
                assert_eq!(receipt.class, OutcomeClass::Win);
                assert_eq!(receipt.win_amount, 10.0 * receipt.multiplier);
                expected += receipt.win_amount;
            } else {
                assert_eq!(receipt.win_amount, 0.0);
            }
            assert_eq!(
                ledger.balance_of("alice", "usdt", BalanceTier::Main),
                expected
            );
        }
    }

    #[tokio::test]
    async fn test_insufficient_funds_aborts_before_outcome() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 5.0);
        let history = Arc::new(InMemoryHistoryStore::new());
        let coordinator = WagerCoordinator::new(
            ledger.clone(),
            ledger.clone(),
            Some(history.clone()),
            PlinqConfig::default(),
        );

        let err = coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .unwrap_err();

        assert!(matches!(err, WagerError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance_of("alice", "usdt", BalanceTier::Main), 5.0);
        assert!(history.is_empty());
        assert!(ledger.referral_entries().is_empty());
    }

    #[tokio::test]
    async fn test_deduct_timeout_aborts_round() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        ledger.set_latency(Some(Duration::from_millis(200)));

        let history = Arc::new(InMemoryHistoryStore::new());
        let config = ConfigBuilder::new()
            .ledger(LedgerConfig {
                deduct_timeout_ms: 20,
                credit_timeout_ms: 20,
            })
            .build();
        let coordinator =
            WagerCoordinator::new(ledger.clone(), ledger.clone(), Some(history.clone()), config);

        let err = coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WagerError::LedgerTimeout {
                operation: "deduct",
                ..
            }
        ));
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_ledger_outage_aborts_round() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        ledger.set_offline(true);
        let coordinator = coordinator(ledger, PlinqConfig::default());

        let err = coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .unwrap_err();

        assert!(matches!(err, WagerError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn test_credit_failure_still_settles_as_win() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        ledger.set_credit_failure(true);
        let coordinator = coordinator(ledger.clone(), always_win_config());

        let receipt = coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .expect("round settles despite credit failure");

        assert_eq!(receipt.class, OutcomeClass::Win);
        assert_eq!(receipt.win_amount, 20.0);
        // Stake gone, winnings stuck pending reconciliation.
        assert_eq!(ledger.balance_of("alice", "usdt", BalanceTier::Main), 90.0);
    }

    #[tokio::test]
    async fn test_invalid_parameters_rejected_before_ledger() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        let coordinator = coordinator(ledger.clone(), PlinqConfig::default());

        for bad in [
            request("", 10.0, "high", 8),
            request("alice", 0.0, "high", 8),
            request("alice", -5.0, "high", 8),
            request("alice", 1_000_000.0, "high", 8),
            request("alice", 10.0, "", 8),
            request("alice", 10.0, "high", 3),
            request("alice", 10.0, "high", 40),
        ] {
            let err = coordinator.place_bet(bad).await.unwrap_err();
            assert!(matches!(err, WagerError::InvalidParameters(_)));
        }

        assert_eq!(ledger.balance_of("alice", "usdt", BalanceTier::Main), 100.0);
    }

    #[tokio::test]
    async fn test_unknown_risk_settles_via_default_table() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        let coordinator = coordinator(ledger, PlinqConfig::default());

        let receipt = coordinator
            .place_bet(request("alice", 10.0, "ultra", 16))
            .await
            .expect("unknown combinations settle on the default table");

        // Default table has 9 slots.
        assert!(receipt.slot < 9);
    }

    #[tokio::test]
    async fn test_settled_round_is_auditable() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        let coordinator = coordinator(ledger, always_win_config());

        let receipt = coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .expect("round settles");

        let round = coordinator
            .round_by_id(&receipt.round_id)
            .await
            .expect("round persisted");

        assert_eq!(round.state, RoundState::Credited);
        coordinator.verify_round(&round).expect("proof verifies");
        assert_eq!(
            fairness::commitment_for(&receipt.server_seed).unwrap(),
            receipt.commitment
        );
    }

    #[tokio::test]
    async fn test_referral_fires_for_losses_too() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        let coordinator = coordinator(ledger.clone(), always_lose_config());

        coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .expect("round settles");

        tokio::time::sleep(Duration::from_millis(20)).await;
        let entries = ledger.referral_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].bet_amount, 10.0);
    }

    #[tokio::test]
    async fn test_history_lists_settled_rounds() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 1_000.0);
        let coordinator = coordinator(ledger, PlinqConfig::default());

        for _ in 0..3 {
            coordinator
                .place_bet(request("alice", 10.0, "low", 9))
                .await
                .expect("round settles");
        }

        let rounds = coordinator.round_history("alice", 10).await;
        assert_eq!(rounds.len(), 3);
        // Fresh server seed every round.
        assert_ne!(rounds[0].seeds.server_seed, rounds[1].seeds.server_seed);
        assert_ne!(rounds[0].seeds.nonce, rounds[1].seeds.nonce);
    }

    #[tokio::test]
    async fn test_disabled_history_degrades_to_stateless() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 100.0);
        let history = Arc::new(InMemoryHistoryStore::new());
        let config = ConfigBuilder::new()
            .features(FeatureConfig {
                history_enabled: false,
                referral_enabled: true,
                stats_enabled: true,
            })
            .build();
        let coordinator =
            WagerCoordinator::new(ledger.clone(), ledger, Some(history.clone()), config);

        coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .expect("round settles");

        assert!(history.is_empty());
        assert!(coordinator.round_history("alice", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_stats_track_settled_rounds() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance("alice", "usdt", BalanceTier::Main, 1_000.0);
        let coordinator = coordinator(ledger, always_win_config());

        coordinator
            .place_bet(request("alice", 10.0, "high", 8))
            .await
            .expect("round settles");

        let stats = coordinator.stats();
        assert_eq!(stats.round_count, 1);
        assert_eq!(stats.total_wagered, 10.0);
        assert_eq!(stats.total_paid_out, 20.0);
    }
}
