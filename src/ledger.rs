//! Ledger collaborator contract.
//!
//! Balances are owned by a remote ledger service and mutated only through
//! deduct/credit calls; atomicity against concurrent spends is the ledger's
//! job (compare-and-decrement), the settlement core only sees success or
//! failure. The in-memory implementation here is the injectable test double
//! used by unit tests and the simulator, with switchable failure modes so
//! timeout and outage paths can be exercised.

use crate::games::types::BalanceTier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Promotional grant gating use of the bonus balance tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveBonus {
    pub user_id: String,
    pub token_id: String,
    pub is_active: bool,
    pub is_completed: bool,
    pub expires_at: DateTime<Utc>,
}

impl ActiveBonus {
    /// A bonus is usable only while active, incomplete, and unexpired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_completed && self.expires_at > now
    }
}

/// Deduction request. `reference` carries the round id so the ledger can
/// deduplicate retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitRequest {
    pub user_id: String,
    pub token_id: String,
    pub tier: BalanceTier,
    pub amount: f64,
    pub reference: String,
}

/// Credit request, idempotent per `reference` so a reconciliation process
/// can retry a failed credit without double-paying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    pub user_id: String,
    pub token_id: String,
    pub tier: BalanceTier,
    pub amount: f64,
    pub reference: String,
}

/// Ledger response: a success flag plus either the resulting balance or an
/// error string, mirroring the remote service's JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LedgerReceipt {
    pub fn accepted(new_balance: f64) -> Self {
        Self {
            success: true,
            new_balance: Some(new_balance),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            new_balance: None,
            error: Some(error.into()),
        }
    }
}

/// Append-only commission record written as a side effect of a deduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralLedgerEntry {
    pub user_id: String,
    pub bet_amount: f64,
    pub token_id: String,
    pub balance_tier: BalanceTier,
    pub timestamp: DateTime<Utc>,
}

/// Minimal contract the settlement core consumes.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn deduct(&self, request: DebitRequest) -> Result<LedgerReceipt, LedgerError>;

    async fn credit(&self, request: CreditRequest) -> Result<LedgerReceipt, LedgerError>;

    async fn get_balance(
        &self,
        user_id: &str,
        token_id: &str,
        tier: BalanceTier,
    ) -> Result<f64, LedgerError>;

    async fn get_active_bonus(
        &self,
        user_id: &str,
        token_id: &str,
    ) -> Result<Option<ActiveBonus>, LedgerError>;
}

/// Sink for referral commission entries, kept separate from the balance
/// contract so tracking can be disabled without touching settlement.
#[async_trait]
pub trait ReferralLedger: Send + Sync {
    async fn record(&self, entry: ReferralLedgerEntry) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BalanceKey {
    user_id: String,
    token_id: String,
    tier: BalanceTier,
}

impl BalanceKey {
    fn new(user_id: &str, token_id: &str, tier: BalanceTier) -> Self {
        Self {
            user_id: user_id.to_string(),
            token_id: token_id.to_string(),
            tier,
        }
    }
}

/// In-memory ledger double implementing the full collaborator contract.
///
/// Balance updates hold the map shard lock for the read-check-write, which
/// gives the same compare-and-decrement guarantee the remote ledger provides.
pub struct InMemoryLedger {
    balances: dashmap::DashMap<BalanceKey, f64>,
    bonuses: dashmap::DashMap<(String, String), ActiveBonus>,
    referrals: RwLock<Vec<ReferralLedgerEntry>>,
    applied_credits: dashmap::DashMap<String, f64>,
    offline: AtomicBool,
    fail_credits: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            balances: dashmap::DashMap::new(),
            bonuses: dashmap::DashMap::new(),
            referrals: RwLock::new(Vec::new()),
            applied_credits: dashmap::DashMap::new(),
            offline: AtomicBool::new(false),
            fail_credits: AtomicBool::new(false),
            latency: RwLock::new(None),
        }
    }

    pub fn set_balance(&self, user_id: &str, token_id: &str, tier: BalanceTier, amount: f64) {
        self.balances
            .insert(BalanceKey::new(user_id, token_id, tier), amount);
    }

    pub fn balance_of(&self, user_id: &str, token_id: &str, tier: BalanceTier) -> f64 {
        self.balances
            .get(&BalanceKey::new(user_id, token_id, tier))
            .map(|entry| *entry)
            .unwrap_or(0.0)
    }

    pub fn grant_bonus(&self, bonus: ActiveBonus) {
        self.bonuses
            .insert((bonus.user_id.clone(), bonus.token_id.clone()), bonus);
    }

    pub fn referral_entries(&self) -> Vec<ReferralLedgerEntry> {
        self.referrals.read().map(|v| v.clone()).unwrap_or_default()
    }

    /// Simulate a full outage: every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail credit calls only, leaving deductions healthy.
    pub fn set_credit_failure(&self, fail: bool) {
        self.fail_credits.store(fail, Ordering::SeqCst);
    }

    /// Delay every response, for exercising caller-side timeouts.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut slot) = self.latency.write() {
            *slot = latency;
        }
    }

    async fn respond(&self) -> Result<(), LedgerError> {
        let latency = self.latency.read().ok().and_then(|slot| *slot);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn deduct(&self, request: DebitRequest) -> Result<LedgerReceipt, LedgerError> {
        self.respond().await?;

        let key = BalanceKey::new(&request.user_id, &request.token_id, request.tier);
        match self.balances.get_mut(&key) {
            Some(mut balance) if *balance >= request.amount => {
                *balance -= request.amount;
                Ok(LedgerReceipt::accepted(*balance))
            }
            _ => Ok(LedgerReceipt::rejected("insufficient funds")),
        }
    }

    async fn credit(&self, request: CreditRequest) -> Result<LedgerReceipt, LedgerError> {
        self.respond().await?;
        if self.fail_credits.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("credit endpoint down".to_string()));
        }

        // Replayed references are acknowledged without moving funds again.
        if self.applied_credits.contains_key(&request.reference) {
            let balance = self.balance_of(&request.user_id, &request.token_id, request.tier);
            return Ok(LedgerReceipt::accepted(balance));
        }

        let key = BalanceKey::new(&request.user_id, &request.token_id, request.tier);
        let mut balance = self.balances.entry(key).or_insert(0.0);
        *balance += request.amount;
        self.applied_credits
            .insert(request.reference.clone(), request.amount);

        Ok(LedgerReceipt::accepted(*balance))
    }

    async fn get_balance(
        &self,
        user_id: &str,
        token_id: &str,
        tier: BalanceTier,
    ) -> Result<f64, LedgerError> {
        self.respond().await?;
        Ok(self.balance_of(user_id, token_id, tier))
    }

    async fn get_active_bonus(
        &self,
        user_id: &str,
        token_id: &str,
    ) -> Result<Option<ActiveBonus>, LedgerError> {
        self.respond().await?;
        Ok(self
            .bonuses
            .get(&(user_id.to_string(), token_id.to_string()))
            .map(|entry| entry.clone()))
    }
}

#[async_trait]
impl ReferralLedger for InMemoryLedger {
    async fn record(&self, entry: ReferralLedgerEntry) -> Result<(), LedgerError> {
        self.respond().await?;
        self.referrals
            .write()
            .map_err(|_| LedgerError::Unavailable("referral log poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}
