//! Round-level error taxonomy.
//!
//! Abortive errors (bad parameters, ledger rejection, ledger outage or
//! timeout, malformed seeds) surface to the caller verbatim and leave no
//! settled round behind. Failures of the credit, history, and referral side
//! effects are absorbed where they occur and only logged.

use crate::fairness::FairnessError;
use crate::games::types::{BalanceTier, WagerRejection};

#[derive(Debug, thiserror::Error)]
pub enum WagerError {
    #[error("Invalid wager parameters: {0}")]
    InvalidParameters(String),

    #[error("Insufficient funds on {tier} balance")]
    InsufficientFunds { tier: BalanceTier },

    #[error("Ledger {operation} timed out after {timeout_ms}ms")]
    LedgerTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error(transparent)]
    Fairness(#[from] FairnessError),
}

impl WagerError {
    /// Wire-shaped error payload for the game-facing contract.
    pub fn to_rejection(&self) -> WagerRejection {
        WagerRejection::new(self.to_string())
    }
}
