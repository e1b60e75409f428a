pub mod engine;
pub mod payout;
pub mod types;

pub use engine::OutcomeEngine;
pub use payout::{PayoutTable, PayoutTables};
pub use types::*;
