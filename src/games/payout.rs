//! Payout tables keyed by risk tier and row count.
//!
//! A table for `rows` pegs holds `rows + 1` multipliers, one per landing
//! slot. Lookups are total: any combination without a configured table
//! resolves to the default `(medium, 8)` table so a round never fails on a
//! missing entry.

use crate::games::types::RiskTier;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fallback combination used for any unconfigured (risk, rows) pair.
pub const DEFAULT_RISK: RiskTier = RiskTier::Medium;
pub const DEFAULT_ROWS: u8 = 8;

/// Multipliers for one (risk, rows) combination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutTable {
    multipliers: Vec<f64>,
}

impl PayoutTable {
    pub fn new(multipliers: Vec<f64>) -> Self {
        Self { multipliers }
    }

    pub fn slot_count(&self) -> usize {
        self.multipliers.len()
    }

    /// Multiplier for a landing slot. Total over `[0, slot_count)`; the
    /// caller hands in a draw already bounded to the slot range.
    pub fn multiplier(&self, slot: usize) -> f64 {
        self.multipliers[slot % self.multipliers.len()]
    }

    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }
}

static BUILTIN_TABLES: Lazy<HashMap<(RiskTier, u8), PayoutTable>> = Lazy::new(|| {
    let mut tables = HashMap::new();

    tables.insert(
        (RiskTier::Low, 8),
        PayoutTable::new(vec![5.6, 2.1, 1.1, 1.0, 0.5, 1.0, 1.1, 2.1, 5.6]),
    );
    tables.insert(
        (RiskTier::Low, 9),
        PayoutTable::new(vec![5.6, 2.0, 1.6, 1.0, 0.7, 0.7, 1.0, 1.6, 2.0, 5.6]),
    );
    tables.insert(
        (RiskTier::Medium, 8),
        PayoutTable::new(vec![13.0, 3.0, 1.3, 0.7, 0.4, 0.7, 1.3, 3.0, 13.0]),
    );
    tables.insert(
        (RiskTier::Medium, 9),
        PayoutTable::new(vec![18.0, 4.0, 1.7, 0.9, 0.5, 0.5, 0.9, 1.7, 4.0, 18.0]),
    );
    tables.insert(
        (RiskTier::High, 8),
        PayoutTable::new(vec![29.0, 4.0, 1.5, 0.3, 0.2, 0.3, 1.5, 4.0, 29.0]),
    );
    tables.insert(
        (RiskTier::High, 9),
        PayoutTable::new(vec![43.0, 7.0, 2.0, 0.6, 0.2, 0.2, 0.6, 2.0, 7.0, 43.0]),
    );

    tables
});

/// Resolved payout configuration: built-in tables plus any overrides loaded
/// from configuration.
#[derive(Debug, Clone)]
pub struct PayoutTables {
    tables: HashMap<(RiskTier, u8), PayoutTable>,
}

impl PayoutTables {
    /// The built-in table set.
    pub fn builtin() -> Self {
        Self {
            tables: BUILTIN_TABLES.clone(),
        }
    }

    /// Built-in tables with configured overrides layered on top.
    pub fn with_overrides(overrides: impl IntoIterator<Item = ((RiskTier, u8), PayoutTable)>) -> Self {
        let mut tables = BUILTIN_TABLES.clone();
        for (key, table) in overrides {
            tables.insert(key, table);
        }
        Self { tables }
    }

    /// Look up the table for a (risk, rows) pair, falling back to the default
    /// combination when the pair is unconfigured or the risk tier is unknown.
    pub fn lookup(&self, risk: Option<RiskTier>, rows: u8) -> &PayoutTable {
        if let Some(tier) = risk {
            if let Some(table) = self.tables.get(&(tier, rows)) {
                return table;
            }
        }

        let requested = risk
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        tracing::warn!(
            risk = %requested,
            rows,
            default_risk = %DEFAULT_RISK,
            default_rows = DEFAULT_ROWS,
            "Unconfigured payout combination; falling back to default table"
        );

        self.tables
            .get(&(DEFAULT_RISK, DEFAULT_ROWS))
            .unwrap_or_else(|| unreachable!("default payout table is always present"))
    }

    pub fn contains(&self, risk: RiskTier, rows: u8) -> bool {
        self.tables.contains_key(&(risk, rows))
    }
}

impl Default for PayoutTables {
    fn default() -> Self {
        Self::builtin()
    }
}
