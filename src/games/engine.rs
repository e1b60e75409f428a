//! Outcome resolution: maps a bounded draw to a payout multiplier and a
//! drop path that reconciles to the same draw.

use crate::games::payout::{PayoutTable, PayoutTables};
use crate::games::types::{OutcomeClass, PegDirection, RoundOutcome, RoundParams};
use sha2::{Digest, Sha256};

/// Resolves draws against the configured payout tables.
pub struct OutcomeEngine {
    tables: PayoutTables,
}

impl OutcomeEngine {
    pub fn new(tables: PayoutTables) -> Self {
        Self { tables }
    }

    /// Slot range the draw must be bounded to for these parameters. Uses the
    /// same table lookup as [`resolve`](Self::resolve), so a fallback to the
    /// default table is reflected here as well.
    pub fn slot_count(&self, params: &RoundParams) -> usize {
        self.table_for(params).slot_count()
    }

    /// Resolve a bounded draw into its multiplier, classification, and drop
    /// path. Pure and idempotent: the same `(params, draw)` always yields the
    /// identical outcome.
    pub fn resolve(&self, params: &RoundParams, draw: usize) -> RoundOutcome {
        let table = self.table_for(params);
        let slot = draw % table.slot_count();
        let multiplier = table.multiplier(slot);

        // The visual path must land in the drawn slot; anything else would
        // contradict the published fairness proof.
        let rows = table.slot_count() - 1;
        let path = derive_path(&params.risk, rows, slot);

        RoundOutcome {
            slot,
            multiplier,
            path,
            class: classify(multiplier),
        }
    }

    fn table_for(&self, params: &RoundParams) -> &PayoutTable {
        self.tables.lookup(params.risk_tier(), params.rows)
    }
}

impl Default for OutcomeEngine {
    fn default() -> Self {
        Self::new(PayoutTables::builtin())
    }
}

fn classify(multiplier: f64) -> OutcomeClass {
    if multiplier > 1.0 {
        OutcomeClass::Win
    } else if multiplier == 1.0 {
        OutcomeClass::Draw
    } else {
        OutcomeClass::Loss
    }
}

/// Derive the peg-by-peg drop path for a slot.
///
/// The ball makes one left/right decision per row and lands in the slot equal
/// to its number of rights, so a path for slot `s` must contain exactly `s`
/// rights. Free decisions come from a hash stream over the landed slot; a
/// decision is forced whenever the remaining rows would otherwise make the
/// target slot unreachable.
fn derive_path(risk: &str, rows: usize, slot: usize) -> Vec<PegDirection> {
    let digest = Sha256::digest(
        format!("path:{}:{}:{}", risk.to_ascii_lowercase(), rows, slot).as_bytes(),
    );
    let bit = |i: usize| (digest[(i / 8) % digest.len()] >> (7 - (i % 8))) & 1 == 1;

    let mut path = Vec::with_capacity(rows);
    let mut rights_left = slot.min(rows);

    for step in 0..rows {
        let steps_left = rows - step;
        let dir = if rights_left == 0 {
            PegDirection::Left
        } else if rights_left == steps_left {
            PegDirection::Right
        } else if bit(step) {
            PegDirection::Right
        } else {
            PegDirection::Left
        };

        if dir == PegDirection::Right {
            rights_left -= 1;
        }
        path.push(dir);
    }

    path
}
