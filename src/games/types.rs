use crate::fairness::SeedPair;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk tiers with a configured payout table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Parse a player-supplied tier name. Unknown names return `None` and
    /// resolve against the default payout table downstream.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "low" => Some(RiskTier::Low),
            "medium" => Some(RiskTier::Medium),
            "high" => Some(RiskTier::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

/// Balance bucket a wager is funded from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BalanceTier {
    Main,
    Bonus,
}

impl fmt::Display for BalanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceTier::Main => write!(f, "main"),
            BalanceTier::Bonus => write!(f, "bonus"),
        }
    }
}

/// Outcome classification relative to the stake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeClass {
    Win,
    Draw,
    Loss,
}

/// One peg decision of the visual drop path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PegDirection {
    Left,
    Right,
}

/// Player-chosen round parameters.
///
/// `risk` is kept as requested; unknown tier names fall back to the default
/// payout table at resolution time rather than failing the round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundParams {
    pub risk: String,
    pub rows: u8,
}

impl RoundParams {
    pub fn new(risk: impl Into<String>, rows: u8) -> Self {
        Self {
            risk: risk.into(),
            rows,
        }
    }

    pub fn risk_tier(&self) -> Option<RiskTier> {
        RiskTier::parse(&self.risk)
    }

    /// Number of payout slots: one more than the peg row count.
    pub fn slot_count(&self) -> usize {
        self.rows as usize + 1
    }
}

/// Settlement progress of a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    Init,
    Deducted,
    ResultComputed,
    Credited,
    NoCredit,
    HistoryRecorded,
    Done,
    Aborted,
}

/// Resolved outcome for a draw: the landed slot, its multiplier, the
/// reconciled drop path, and the win/draw/loss classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundOutcome {
    pub slot: usize,
    pub multiplier: f64,
    pub path: Vec<PegDirection>,
    pub class: OutcomeClass,
}

/// A settled round, immutable once written to history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRound {
    pub round_id: String,
    pub user_id: String,
    pub token_id: String,
    pub bet_amount: f64,
    pub params: RoundParams,
    pub seeds: SeedPair,
    pub commitment: String,
    pub draw: usize,
    pub multiplier: f64,
    pub win_amount: f64,
    pub result_path: Vec<PegDirection>,
    pub class: OutcomeClass,
    pub balance_tier: BalanceTier,
    pub state: RoundState,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Request to place a wager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetRequest {
    pub user_id: String,
    pub token_id: String,
    pub bet_amount: f64,
    pub risk: String,
    pub rows: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_seed: Option<String>,
}

/// Settled-round receipt returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundReceipt {
    pub success: bool,
    pub round_id: String,
    pub balance_tier: BalanceTier,
    pub bet_amount: f64,
    pub multiplier: f64,
    pub win_amount: f64,
    pub class: OutcomeClass,
    pub slot: usize,
    pub result_path: Vec<PegDirection>,
    pub commitment: String,
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
}

impl RoundReceipt {
    pub fn from_round(round: &GameRound) -> Self {
        Self {
            success: true,
            round_id: round.round_id.clone(),
            balance_tier: round.balance_tier,
            bet_amount: round.bet_amount,
            multiplier: round.multiplier,
            win_amount: round.win_amount,
            class: round.class,
            slot: round.draw,
            result_path: round.result_path.clone(),
            commitment: round.commitment.clone(),
            server_seed: round.seeds.server_seed.clone(),
            client_seed: round.seeds.client_seed.clone(),
            nonce: round.seeds.nonce,
        }
    }
}

/// Error payload mirrored to callers when a wager is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerRejection {
    pub success: bool,
    pub error: String,
}

impl WagerRejection {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_tier_parsing() {
        assert_eq!(RiskTier::parse("low"), Some(RiskTier::Low));
        assert_eq!(RiskTier::parse("Medium"), Some(RiskTier::Medium));
        assert_eq!(RiskTier::parse("HIGH"), Some(RiskTier::High));
        assert_eq!(RiskTier::parse("ultra"), None);
        assert_eq!(RiskTier::parse(""), None);
    }

    #[test]
    fn test_slot_count_is_rows_plus_one() {
        let params = RoundParams::new("high", 8);
        assert_eq!(params.slot_count(), 9);

        let params = RoundParams::new("low", 16);
        assert_eq!(params.slot_count(), 17);
    }

    #[test]
    fn test_enum_wire_encoding() {
        assert_eq!(serde_json::to_string(&BalanceTier::Bonus).unwrap(), "\"bonus\"");
        assert_eq!(serde_json::to_string(&OutcomeClass::Draw).unwrap(), "\"draw\"");
        assert_eq!(serde_json::to_string(&PegDirection::Left).unwrap(), "\"left\"");
        assert_eq!(serde_json::to_string(&RiskTier::High).unwrap(), "\"high\"");
    }
}
