//! Plinq settlement simulator.
//!
//! Drives the coordinator end to end against the in-memory ledger: seeds a
//! balance, plays a batch of rounds, audits every fairness proof, and prints
//! the aggregate result.

use clap::Parser;
use plinq::config::ConfigLoader;
use plinq::coordinator::WagerCoordinator;
use plinq::games::types::{BalanceTier, PlaceBetRequest};
use plinq::history::InMemoryHistoryStore;
use plinq::ledger::{ActiveBonus, InMemoryLedger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plinq", about = "Provably-fair plinko settlement simulator")]
struct SimulatorArgs {
    /// Number of rounds to play
    #[arg(long, default_value_t = 20)]
    rounds: u32,

    /// Stake per round
    #[arg(long, default_value_t = 1.0)]
    bet: f64,

    /// Risk tier (low, medium, high)
    #[arg(long, default_value = "medium")]
    risk: String,

    /// Peg rows per round
    #[arg(long, default_value_t = 8)]
    rows: u8,

    /// Player identifier
    #[arg(long, default_value = "player-1")]
    user: String,

    /// Token identifier
    #[arg(long, default_value = "usdt")]
    token: String,

    /// Starting main balance
    #[arg(long, default_value_t = 1_000.0)]
    balance: f64,

    /// Starting bonus balance (granted with a live bonus when non-zero)
    #[arg(long, default_value_t = 0.0)]
    bonus: f64,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = SimulatorArgs::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;

    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_balance(&args.user, &args.token, BalanceTier::Main, args.balance);
    if args.bonus > 0.0 {
        ledger.set_balance(&args.user, &args.token, BalanceTier::Bonus, args.bonus);
        ledger.grant_bonus(ActiveBonus {
            user_id: args.user.clone(),
            token_id: args.token.clone(),
            is_active: true,
            is_completed: false,
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        });
    }

    let history = Arc::new(InMemoryHistoryStore::new());
    let coordinator = WagerCoordinator::new(
        ledger.clone(),
        ledger.clone(),
        Some(history.clone()),
        config,
    );

    println!("🎰 Plinq settlement simulator");
    println!("=============================");
    println!(
        "{} rounds of {} {} at risk={} rows={}",
        args.rounds, args.bet, args.token, args.risk, args.rows
    );

    let mut settled = 0u32;
    let mut rejected = 0u32;
    let mut audited = 0u32;

    for i in 0..args.rounds {
        let request = PlaceBetRequest {
            user_id: args.user.clone(),
            token_id: args.token.clone(),
            bet_amount: args.bet,
            risk: args.risk.clone(),
            rows: args.rows,
            client_seed: None,
        };

        match coordinator.place_bet(request).await {
            Ok(receipt) => {
                settled += 1;
                tracing::info!(
                    round = i + 1,
                    slot = receipt.slot,
                    multiplier = receipt.multiplier,
                    win = receipt.win_amount,
                    tier = %receipt.balance_tier,
                    "Round settled"
                );

                if let Some(round) = coordinator.round_by_id(&receipt.round_id).await {
                    match coordinator.verify_round(&round) {
                        Ok(()) => audited += 1,
                        Err(e) => tracing::error!(round_id = %round.round_id, %e, "Audit failed"),
                    }
                }
            }
            Err(e) => {
                rejected += 1;
                tracing::warn!(round = i + 1, %e, "Round rejected");
            }
        }
    }

    let stats = coordinator.stats();
    println!();
    println!("🎯 Results");
    println!(
        "   settled: {} rejected: {} proofs verified: {}",
        settled, rejected, audited
    );
    println!(
        "   wagered: {:.2} paid out: {:.2} house edge: {:.2}%",
        stats.total_wagered,
        stats.total_paid_out,
        stats.house_edge() * 100.0
    );
    println!(
        "   final balances: main={:.2} bonus={:.2}",
        ledger.balance_of(&args.user, &args.token, BalanceTier::Main),
        ledger.balance_of(&args.user, &args.token, BalanceTier::Bonus)
    );

    Ok(())
}
