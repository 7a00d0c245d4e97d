//! Configuration section types

use serde::Deserialize;

use crate::backtesting::StrategyConfig;
use crate::sizing::SizingPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Default bankroll in currency units
    pub bankroll: f64,
    /// Kelly multiplier (0.25 = quarter Kelly)
    pub kelly_fraction: f64,
    /// Minimum edge to bet
    pub min_edge: f64,
    pub min_bet: f64,
    pub max_bet: f64,
    /// Minimum confidence for mispricing signals
    pub min_confidence: f64,
    /// Hard cap on the bankroll fraction of a single bet
    pub max_bankroll_fraction: f64,
    /// Bet cap as a fraction of market liquidity
    pub impact_threshold: f64,
    /// Liquidity assumed when a snapshot does not report one
    pub default_liquidity: f64,
}

impl SizingConfig {
    pub fn policy(&self) -> SizingPolicy {
        SizingPolicy {
            kelly_fraction: self.kelly_fraction,
            min_edge: self.min_edge,
            min_bet: self.min_bet,
            max_bet: self.max_bet,
            max_bankroll_fraction: self.max_bankroll_fraction,
            impact_threshold: self.impact_threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    /// Starting capital for each run
    pub initial_capital: f64,
    /// Configurations for comparison mode
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyConfig>,
}

pub fn default_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::new("conservative", 0.10, 0.10),
        StrategyConfig::new("quarter_kelly", 0.25, 0.05),
        StrategyConfig::new("half_kelly", 0.50, 0.05),
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Alerts kept in memory before the oldest are dropped
    pub history_limit: usize,
}
