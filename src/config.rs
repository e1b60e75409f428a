//! Configuration for the settlement core.
//!
//! Defaults first, then an optional TOML file, then `PLINQ_*` environment
//! overrides, then validation. Payout table overrides loaded here are layered
//! over the built-in tables when the outcome engine is constructed.

use crate::games::payout::PayoutTable;
use crate::games::types::RiskTier;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlinqConfig {
    #[serde(default)]
    pub betting: BettingConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub payout_tables: Vec<PayoutTableConfig>,
}

impl Default for PlinqConfig {
    fn default() -> Self {
        Self {
            betting: BettingConfig::default(),
            ledger: LedgerConfig::default(),
            features: FeatureConfig::default(),
            payout_tables: Vec::new(),
        }
    }
}

/// Wager bounds checked before any ledger traffic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BettingConfig {
    pub min_bet: f64,
    pub max_bet: f64,
    pub min_rows: u8,
    pub max_rows: u8,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            min_bet: 0.01,
            max_bet: 1_000.0,
            min_rows: 8,
            max_rows: 16,
        }
    }
}

/// Per-operation deadlines for remote ledger calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    pub deduct_timeout_ms: u64,
    pub credit_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            deduct_timeout_ms: 3_000,
            credit_timeout_ms: 3_000,
        }
    }
}

/// Feature toggles for the non-settlement concerns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureConfig {
    pub history_enabled: bool,
    pub referral_enabled: bool,
    pub stats_enabled: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            history_enabled: true,
            referral_enabled: true,
            stats_enabled: true,
        }
    }
}

/// One payout table override from configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutTableConfig {
    pub risk: String,
    pub rows: u8,
    pub multipliers: Vec<f64>,
}

impl PlinqConfig {
    /// Configured payout overrides in the shape the engine consumes.
    pub fn payout_overrides(&self) -> Vec<((RiskTier, u8), PayoutTable)> {
        self.payout_tables
            .iter()
            .filter_map(|entry| {
                RiskTier::parse(&entry.risk)
                    .map(|tier| ((tier, entry.rows), PayoutTable::new(entry.multipliers.clone())))
            })
            .collect()
    }
}

/// Configuration loader with file and environment variable support.
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn load(&self) -> Result<PlinqConfig, ConfigError> {
        let mut config = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            PlinqConfig::default()
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> Result<PlinqConfig, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(&self, config: &mut PlinqConfig) -> Result<(), ConfigError> {
        if let Ok(value) = env::var("PLINQ_MIN_BET") {
            config.betting.min_bet = parse_env("PLINQ_MIN_BET", &value)?;
        }
        if let Ok(value) = env::var("PLINQ_MAX_BET") {
            config.betting.max_bet = parse_env("PLINQ_MAX_BET", &value)?;
        }
        if let Ok(value) = env::var("PLINQ_DEDUCT_TIMEOUT_MS") {
            config.ledger.deduct_timeout_ms = parse_env("PLINQ_DEDUCT_TIMEOUT_MS", &value)?;
        }
        if let Ok(value) = env::var("PLINQ_CREDIT_TIMEOUT_MS") {
            config.ledger.credit_timeout_ms = parse_env("PLINQ_CREDIT_TIMEOUT_MS", &value)?;
        }
        if let Ok(value) = env::var("PLINQ_HISTORY_ENABLED") {
            config.features.history_enabled = parse_env("PLINQ_HISTORY_ENABLED", &value)?;
        }
        if let Ok(value) = env::var("PLINQ_REFERRAL_ENABLED") {
            config.features.referral_enabled = parse_env("PLINQ_REFERRAL_ENABLED", &value)?;
        }
        if let Ok(value) = env::var("PLINQ_STATS_ENABLED") {
            config.features.stats_enabled = parse_env("PLINQ_STATS_ENABLED", &value)?;
        }

        Ok(())
    }

    fn validate(&self, config: &PlinqConfig) -> Result<(), ConfigError> {
        if config.betting.min_bet <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "betting.min_bet".to_string(),
                value: config.betting.min_bet.to_string(),
                reason: "Minimum bet must be positive".to_string(),
            });
        }
        if config.betting.max_bet < config.betting.min_bet {
            return Err(ConfigError::InvalidValue {
                field: "betting.max_bet".to_string(),
                value: config.betting.max_bet.to_string(),
                reason: "Maximum bet must be at least the minimum bet".to_string(),
            });
        }
        if config.betting.min_rows == 0 || config.betting.max_rows < config.betting.min_rows {
            return Err(ConfigError::InvalidValue {
                field: "betting.max_rows".to_string(),
                value: config.betting.max_rows.to_string(),
                reason: "Row bounds must be non-zero and ordered".to_string(),
            });
        }
        if config.ledger.deduct_timeout_ms < 10 || config.ledger.credit_timeout_ms < 10 {
            return Err(ConfigError::InvalidValue {
                field: "ledger.timeouts".to_string(),
                value: format!(
                    "{}/{}",
                    config.ledger.deduct_timeout_ms, config.ledger.credit_timeout_ms
                ),
                reason: "Timeouts must be at least 10ms".to_string(),
            });
        }

        for entry in &config.payout_tables {
            if RiskTier::parse(&entry.risk).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "payout_tables.risk".to_string(),
                    value: entry.risk.clone(),
                    reason: "Unknown risk tier".to_string(),
                });
            }
            if entry.multipliers.len() != entry.rows as usize + 1 {
                return Err(ConfigError::InvalidValue {
                    field: "payout_tables.multipliers".to_string(),
                    value: entry.multipliers.len().to_string(),
                    reason: format!("Table for {} rows needs {} slots", entry.rows, entry.rows + 1),
                });
            }
            if entry.multipliers.iter().any(|m| !m.is_finite() || *m < 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: "payout_tables.multipliers".to_string(),
                    value: format!("{:?}", entry.multipliers),
                    reason: "Multipliers must be finite and non-negative".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn save(&self, config: &PlinqConfig, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write to {}: {}", path, e)))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: "Unparseable override".to_string(),
    })
}

/// Builder for assembling configurations in code.
pub struct ConfigBuilder {
    config: PlinqConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PlinqConfig::default(),
        }
    }

    pub fn betting(mut self, betting: BettingConfig) -> Self {
        self.config.betting = betting;
        self
    }

    pub fn ledger(mut self, ledger: LedgerConfig) -> Self {
        self.config.ledger = ledger;
        self
    }

    pub fn features(mut self, features: FeatureConfig) -> Self {
        self.config.features = features;
        self
    }

    pub fn payout_table(mut self, table: PayoutTableConfig) -> Self {
        self.config.payout_tables.push(table);
        self
    }

    pub fn build(self) -> PlinqConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
