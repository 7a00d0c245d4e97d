//! Configuration management
//!
//! Loads built-in defaults, then optional YAML files, then environment
//! variables (`FORECAST_EDGE__SECTION__KEY`, `.env` honoured).

mod types;

pub use types::*;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::arbitrage::ScannerConfig;
use crate::ensemble::EnsembleWeights;
use crate::error::ConfigError;
use crate::portfolio::PortfolioConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub sizing: SizingConfig,
    pub ensemble: EnsembleConfig,
    pub arbitrage: ScannerConfig,
    pub portfolio: PortfolioConfig,
    pub backtest: BacktestConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    pub weights: EnsembleWeights,
}

fn check(ok: bool, field: &'static str, reason: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: reason.to_string(),
        })
    }
}

fn in_unit(x: f64) -> bool {
    x.is_finite() && (0.0..=1.0).contains(&x)
}

fn in_half_open_unit(x: f64) -> bool {
    x.is_finite() && x > 0.0 && x <= 1.0
}

impl AppConfig {
    /// Load configuration from `config/default`, `config/local` and environment
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Same as [`AppConfig::load`], plus a required explicit file layered on top
    pub fn load_with(file: Option<&Path>) -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            // Sizing defaults
            .set_default("sizing.bankroll", 1000.0)?
            .set_default("sizing.kelly_fraction", 0.25)?
            .set_default("sizing.min_edge", 0.05)?
            .set_default("sizing.min_bet", 10.0)?
            .set_default("sizing.max_bet", 100.0)?
            .set_default("sizing.min_confidence", 0.6)?
            .set_default("sizing.max_bankroll_fraction", 0.5)?
            .set_default("sizing.impact_threshold", 0.1)?
            .set_default("sizing.default_liquidity", 1000.0)?
            // Ensemble defaults
            .set_default("ensemble.weights.llm", 0.5)?
            .set_default("ensemble.weights.base_rate", 0.2)?
            .set_default("ensemble.weights.market_momentum", 0.15)?
            .set_default("ensemble.weights.contrarian", 0.15)?
            // Arbitrage defaults
            .set_default("arbitrage.min_profit_threshold", 0.02)?
            // Portfolio defaults
            .set_default("portfolio.risk_free_rate", 0.0)?
            .set_default("portfolio.risk_tolerance", 0.5)?
            .set_default("portfolio.correlation_threshold", 0.7)?
            .set_default("portfolio.max_iterations", 1000)?
            .set_default("portfolio.tolerance", 1e-9)?
            .set_default("portfolio.zero_spread_floor", 0.1)?
            .set_default("portfolio.baseline_correlation", 0.1)?
            .set_default("portfolio.suggestion_risk_tolerance", 0.6)?
            // Backtest defaults (strategies default via serde)
            .set_default("backtest.initial_capital", 1000.0)?
            // Alert defaults
            .set_default("alerts.history_limit", 100)?
            // Load config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Override with environment variables (FORECAST_EDGE__*)
            .add_source(Environment::with_prefix("FORECAST_EDGE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate().context("Invalid configuration")?;

        Ok(app_config)
    }

    /// Range-check every knob
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sizing;
        check(
            s.bankroll.is_finite() && s.bankroll > 0.0,
            "sizing.bankroll",
            "must be positive",
        )?;
        check(
            in_half_open_unit(s.kelly_fraction),
            "sizing.kelly_fraction",
            "must be in (0, 1]",
        )?;
        check(
            s.min_edge.is_finite() && (0.0..1.0).contains(&s.min_edge),
            "sizing.min_edge",
            "must be in [0, 1)",
        )?;
        check(
            s.min_bet.is_finite() && s.min_bet >= 0.0,
            "sizing.min_bet",
            "must be non-negative",
        )?;
        check(
            s.max_bet.is_finite() && s.max_bet >= s.min_bet,
            "sizing.max_bet",
            "must be at least min_bet",
        )?;
        check(
            in_unit(s.min_confidence),
            "sizing.min_confidence",
            "must be in [0, 1]",
        )?;
        check(
            in_half_open_unit(s.max_bankroll_fraction),
            "sizing.max_bankroll_fraction",
            "must be in (0, 1]",
        )?;
        check(
            in_half_open_unit(s.impact_threshold),
            "sizing.impact_threshold",
            "must be in (0, 1]",
        )?;
        check(
            s.default_liquidity.is_finite() && s.default_liquidity > 0.0,
            "sizing.default_liquidity",
            "must be positive",
        )?;

        check(
            self.ensemble.weights.is_valid(),
            "ensemble.weights",
            "must be non-negative with a positive total",
        )?;

        let threshold = self.arbitrage.min_profit_threshold;
        check(
            threshold.is_finite() && (0.0..1.0).contains(&threshold),
            "arbitrage.min_profit_threshold",
            "must be in [0, 1)",
        )?;

        let p = &self.portfolio;
        check(
            p.risk_free_rate.is_finite(),
            "portfolio.risk_free_rate",
            "must be finite",
        )?;
        check(
            in_unit(p.risk_tolerance),
            "portfolio.risk_tolerance",
            "must be in [0, 1]",
        )?;
        check(
            in_unit(p.correlation_threshold),
            "portfolio.correlation_threshold",
            "must be in [0, 1]",
        )?;
        check(
            p.max_iterations > 0,
            "portfolio.max_iterations",
            "must be positive",
        )?;
        check(
            p.tolerance.is_finite() && p.tolerance > 0.0,
            "portfolio.tolerance",
            "must be positive",
        )?;
        check(
            p.zero_spread_floor.is_finite() && p.zero_spread_floor > 0.0,
            "portfolio.zero_spread_floor",
            "must be positive",
        )?;
        check(
            p.baseline_correlation.is_finite() && (-1.0..=1.0).contains(&p.baseline_correlation),
            "portfolio.baseline_correlation",
            "must be in [-1, 1]",
        )?;
        check(
            in_unit(p.suggestion_risk_tolerance),
            "portfolio.suggestion_risk_tolerance",
            "must be in [0, 1]",
        )?;

        let b = &self.backtest;
        check(
            b.initial_capital.is_finite() && b.initial_capital > 0.0,
            "backtest.initial_capital",
            "must be positive",
        )?;
        for strategy in &b.strategies {
            check(
                in_half_open_unit(strategy.kelly_fraction),
                "backtest.strategies.kelly_fraction",
                "must be in (0, 1]",
            )?;
            check(
                strategy.min_edge.is_finite() && strategy.min_edge >= 0.0,
                "backtest.strategies.min_edge",
                "must be non-negative",
            )?;
        }

        check(
            self.alerts.history_limit > 0,
            "alerts.history_limit",
            "must be positive",
        )?;

        Ok(())
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "bankroll={:.2} kelly={:.2} min_edge={:.3} bets=[{:.2}, {:.2}] risk_tol={:.2} arb_threshold={:.3}",
            self.sizing.bankroll,
            self.sizing.kelly_fraction,
            self.sizing.min_edge,
            self.sizing.min_bet,
            self.sizing.max_bet,
            self.portfolio.risk_tolerance,
            self.arbitrage.min_profit_threshold
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let policy = crate::sizing::SizingPolicy::default();
        Self {
            sizing: SizingConfig {
                bankroll: 1000.0,
                kelly_fraction: policy.kelly_fraction,
                min_edge: policy.min_edge,
                min_bet: policy.min_bet,
                max_bet: policy.max_bet,
                min_confidence: 0.6,
                max_bankroll_fraction: policy.max_bankroll_fraction,
                impact_threshold: policy.impact_threshold,
                default_liquidity: crate::types::DEFAULT_LIQUIDITY,
            },
            ensemble: EnsembleConfig {
                weights: EnsembleWeights::default(),
            },
            arbitrage: ScannerConfig::default(),
            portfolio: PortfolioConfig::default(),
            backtest: BacktestConfig {
                initial_capital: 1000.0,
                strategies: default_strategies(),
            },
            alerts: AlertsConfig { history_limit: 100 },
        }
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
