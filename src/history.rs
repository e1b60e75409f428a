//! Round history collaborator.
//!
//! History is an opaque store queried lazily; settlement only appends to it
//! best-effort. Running without a store degrades the system to stateless
//! settlement, where reads come back empty.

use crate::games::types::GameRound;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("History write failed: {0}")]
    WriteFailed(String),

    #[error("History read failed: {0}")]
    ReadFailed(String),
}

#[async_trait]
pub trait RoundHistoryStore: Send + Sync {
    async fn save(&self, round: GameRound) -> Result<(), HistoryError>;

    /// Most recent rounds first.
    async fn list_by_user(&self, user_id: &str, limit: usize)
        -> Result<Vec<GameRound>, HistoryError>;

    async fn get_by_id(&self, round_id: &str) -> Result<Option<GameRound>, HistoryError>;
}

/// Map-backed store used by tests and the simulator.
pub struct InMemoryHistoryStore {
    rounds: dashmap::DashMap<String, GameRound>,
    by_user: dashmap::DashMap<String, Vec<String>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            rounds: dashmap::DashMap::new(),
            by_user: dashmap::DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoundHistoryStore for InMemoryHistoryStore {
    async fn save(&self, round: GameRound) -> Result<(), HistoryError> {
        self.by_user
            .entry(round.user_id.clone())
            .or_default()
            .push(round.round_id.clone());
        self.rounds.insert(round.round_id.clone(), round);
        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<GameRound>, HistoryError> {
        let Some(ids) = self.by_user.get(user_id) else {
            return Ok(Vec::new());
        };

        let rounds = ids
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| self.rounds.get(id).map(|entry| entry.clone()))
            .collect();

        Ok(rounds)
    }

    async fn get_by_id(&self, round_id: &str) -> Result<Option<GameRound>, HistoryError> {
        Ok(self.rounds.get(round_id).map(|entry| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::SeedPair;
    use crate::games::types::{BalanceTier, OutcomeClass, RoundParams, RoundState};
    use chrono::Utc;

    fn round(round_id: &str, user_id: &str) -> GameRound {
        GameRound {
            round_id: round_id.to_string(),
            user_id: user_id.to_string(),
            token_id: "usdt".to_string(),
            bet_amount: 10.0,
            params: RoundParams::new("high", 8),
            seeds: SeedPair {
                server_seed: "ab".repeat(32),
                client_seed: "client".to_string(),
                nonce: 1,
            },
            commitment: "cd".repeat(32),
            draw: 4,
            multiplier: 0.2,
            win_amount: 0.0,
            result_path: Vec::new(),
            class: OutcomeClass::Loss,
            balance_tier: BalanceTier::Main,
            state: RoundState::Done,
            created_at: Utc::now(),
            settled_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_save_and_get_by_id() {
        let store = InMemoryHistoryStore::new();
        store.save(round("r1", "alice")).await.expect("save");

        let loaded = store.get_by_id("r1").await.expect("get");
        assert_eq!(loaded.map(|r| r.round_id), Some("r1".to_string()));
        assert!(store.get_by_id("missing").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first_with_limit() {
        let store = InMemoryHistoryStore::new();
        for i in 0..5 {
            store
                .save(round(&format!("r{}", i), "alice"))
                .await
                .expect("save");
        }
        store.save(round("other", "bob")).await.expect("save");

        let listed = store.list_by_user("alice", 3).await.expect("list");
        let ids: Vec<&str> = listed.iter().map(|r| r.round_id.as_str()).collect();
        assert_eq!(ids, vec!["r4", "r3", "r2"]);
    }

    #[tokio::test]
    async fn test_unknown_user_lists_empty() {
        let store = InMemoryHistoryStore::new();
        assert!(store.list_by_user("ghost", 10).await.expect("list").is_empty());
    }
}
