//! Forecast Edge Library
//!
//! Quantitative decision engine for binary prediction markets:
//! - Probability fusion across an external estimate and heuristics
//! - Fractional Kelly sizing with bankroll and liquidity caps
//! - Correlation-aware mean-variance allocation
//! - Structural arbitrage scanning
//! - Backtesting over resolved markets

pub mod alerts;
pub mod arbitrage;
pub mod backtesting;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod logging;
pub mod portfolio;
pub mod sizing;
pub mod types;

pub use error::{ConfigError, CorrelationError, OptimizerError, ProbabilityError};
pub use types::{MarketSnapshot, NoSignalReason, Outcome, Signal};
