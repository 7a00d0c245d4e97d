//! Backtesting Module
//!
//! Replays resolved markets through the Kelly sizer:
//! - Trade simulation with capital-scaled bet bounds
//! - Performance metrics (win rate, drawdown, Sharpe, ROI)
//! - Multi-configuration comparison
//! - CSV export of the trade history

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::ensemble::MarketEstimator;
use crate::sizing::{calculate_optimal_bet, SizingPolicy};
use crate::types::{MarketSnapshot, Outcome, Signal, DEFAULT_LIQUIDITY};

/// Probability used when no estimator is configured
pub const NEUTRAL_PROBABILITY: f64 = 0.5;
/// Minimum bet as a fraction of running capital
pub const MIN_BET_CAPITAL_FRACTION: f64 = 0.01;
/// Maximum bet as a fraction of running capital
pub const MAX_BET_CAPITAL_FRACTION: f64 = 0.10;

const TRADING_DAYS: f64 = 252.0;

/// Simulated trade record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub market_id: String,
    pub market_question: String,
    pub direction: Outcome,
    pub amount: f64,
    /// Our estimate of P(YES)
    pub estimated_probability: f64,
    pub market_probability: f64,
    pub edge: f64,
    /// Realized outcome
    pub outcome: Outcome,
    pub pnl: f64,
    /// pnl / amount
    pub roi: f64,
    /// Running capital after settlement
    pub capital_after: f64,
}

impl BacktestTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// Backtest performance metrics. Rates and ROI are fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    /// Largest peak-to-current drop in cumulative P&L (currency)
    pub max_drawdown: f64,
    /// Annualized, over per-trade returns on initial capital
    pub sharpe_ratio: f64,
    pub roi: f64,
    pub final_capital: f64,
    pub largest_win: f64,
    /// Absolute size of the worst loss
    pub largest_loss: f64,
}

impl BacktestMetrics {
    /// Metrics for a run with no trades
    pub fn empty(initial_capital: f64) -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            total_pnl: 0.0,
            avg_pnl: 0.0,
            max_drawdown: 0.0,
            sharpe_ratio: 0.0,
            roi: 0.0,
            final_capital: initial_capital,
            largest_win: 0.0,
            largest_loss: 0.0,
        }
    }
}

/// Named sizing configuration for comparison runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub kelly_fraction: f64,
    pub min_edge: f64,
}

impl StrategyConfig {
    pub fn new(name: impl Into<String>, kelly_fraction: f64, min_edge: f64) -> Self {
        Self {
            name: name.into(),
            kelly_fraction,
            min_edge,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub name: String,
    pub kelly_fraction: f64,
    pub min_edge: f64,
    #[serde(flatten)]
    pub metrics: BacktestMetrics,
}

/// One row per configuration, in the order supplied
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonTable {
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn get(&self, name: &str) -> Option<&BacktestMetrics> {
        self.rows.iter().find(|r| r.name == name).map(|r| &r.metrics)
    }

    /// Configuration with the highest ROI
    pub fn best_by_roi(&self) -> Option<&ComparisonRow> {
        self.rows.iter().max_by(|a, b| a.metrics.roi.total_cmp(&b.metrics.roi))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Backtester
pub struct Backtester {
    initial_capital: f64,
    /// Non-bound sizing knobs (bankroll cap, impact threshold)
    policy: SizingPolicy,
    estimator: Option<Box<dyn MarketEstimator>>,
    /// Used for snapshots without a liquidity field
    default_liquidity: f64,
    trades: Vec<BacktestTrade>,
    /// Running capital, starting with the initial capital
    equity_curve: Vec<f64>,
}

impl Backtester {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            policy: SizingPolicy::default(),
            estimator: None,
            default_liquidity: DEFAULT_LIQUIDITY,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn with_estimator(mut self, estimator: Box<dyn MarketEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn with_policy(mut self, policy: SizingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_liquidity(mut self, liquidity: f64) -> Self {
        self.default_liquidity = liquidity;
        self
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    fn estimate(&self, market: &MarketSnapshot) -> Option<f64> {
        match &self.estimator {
            Some(estimator) => estimator.estimate_market(market),
            None => Some(NEUTRAL_PROBABILITY),
        }
    }

    /// Size and settle one resolved market against the given running capital
    fn simulate_trade(
        &self,
        market: &MarketSnapshot,
        outcome: Outcome,
        estimated_probability: f64,
        policy: &SizingPolicy,
    ) -> Option<BacktestTrade> {
        let bet = match calculate_optimal_bet(
            self.initial_capital,
            estimated_probability,
            market.probability,
            market.liquidity_or(self.default_liquidity),
            policy,
        ) {
            Signal::Found(bet) => bet,
            Signal::NoSignal(reason) => {
                debug!(market = %market.id, %reason, "no bet");
                return None;
            }
        };

        let pnl = if outcome == bet.direction {
            bet.amount / bet.entry_price() - bet.amount
        } else {
            -bet.amount
        };

        Some(BacktestTrade {
            market_id: market.id.clone(),
            market_question: market.question.clone(),
            direction: bet.direction,
            amount: bet.amount,
            estimated_probability,
            market_probability: market.probability,
            edge: bet.edge,
            outcome,
            pnl,
            roi: pnl / bet.amount,
            capital_after: 0.0,
        })
    }

    /// Run the backtest. Trades from any previous run are discarded.
    pub fn run(
        &mut self,
        markets: &[MarketSnapshot],
        kelly_fraction: f64,
        min_edge: f64,
    ) -> BacktestMetrics {
        self.trades.clear();
        self.equity_curve.clear();
        self.equity_curve.push(self.initial_capital);

        info!(
            markets = markets.len(),
            kelly_fraction,
            min_edge,
            initial_capital = self.initial_capital,
            "backtest started"
        );

        let mut capital = self.initial_capital;
        for market in markets {
            let Some(outcome) = market.resolved_outcome() else {
                continue;
            };
            let Some(estimate) = self.estimate(market) else {
                continue;
            };

            let policy = self.policy.with_kelly(kelly_fraction, min_edge).with_bounds(
                capital * MIN_BET_CAPITAL_FRACTION,
                capital * MAX_BET_CAPITAL_FRACTION,
            );

            if let Some(mut trade) = self.simulate_trade(market, outcome, estimate, &policy) {
                capital += trade.pnl;
                trade.capital_after = capital;
                self.trades.push(trade);
                self.equity_curve.push(capital);

                if capital <= 0.0 {
                    warn!(capital, trades = self.trades.len(), "capital exhausted, stopping backtest");
                    break;
                }
            }
        }

        let metrics = self.calculate_metrics();
        info!(
            trades = metrics.total_trades,
            roi = metrics.roi,
            final_capital = metrics.final_capital,
            "backtest finished"
        );
        metrics
    }

    /// Calculate performance metrics from trades
    pub fn calculate_metrics(&self) -> BacktestMetrics {
        if self.trades.is_empty() {
            return BacktestMetrics::empty(self.initial_capital);
        }

        let total_trades = self.trades.len();
        let winning_trades = self.trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = self.trades.iter().filter(|t| t.pnl < 0.0).count();

        let total_pnl: f64 = self.trades.iter().map(|t| t.pnl).sum();
        let avg_pnl = total_pnl / total_trades as f64;

        let largest_win = self.trades.iter().map(|t| t.pnl).fold(0.0, f64::max);
        let largest_loss = self.trades.iter().map(|t| -t.pnl).fold(0.0, f64::max);

        // Max drawdown of cumulative P&L, peak starting at zero
        let mut cumulative = 0.0;
        let mut peak: f64 = 0.0;
        let mut max_drawdown: f64 = 0.0;
        for trade in &self.trades {
            cumulative += trade.pnl;
            peak = peak.max(cumulative);
            max_drawdown = max_drawdown.max(peak - cumulative);
        }

        // Annualized Sharpe over returns on initial capital, sample std dev
        let sharpe_ratio = if total_trades > 1 && self.initial_capital > 0.0 {
            let returns: Vec<f64> = self
                .trades
                .iter()
                .map(|t| t.pnl / self.initial_capital)
                .collect();
            let mean = returns.iter().sum::<f64>() / total_trades as f64;
            let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
                / (total_trades - 1) as f64;
            let std_dev = variance.sqrt();
            if std_dev > 0.0 {
                mean / std_dev * TRADING_DAYS.sqrt()
            } else {
                0.0
            }
        } else {
            0.0
        };

        let roi = if self.initial_capital > 0.0 {
            total_pnl / self.initial_capital
        } else {
            0.0
        };

        BacktestMetrics {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate: winning_trades as f64 / total_trades as f64,
            total_pnl,
            avg_pnl,
            max_drawdown,
            sharpe_ratio,
            roi,
            final_capital: self.initial_capital + total_pnl,
            largest_win,
            largest_loss,
        }
    }

    /// Re-run the full backtest once per configuration
    pub fn compare(
        &mut self,
        markets: &[MarketSnapshot],
        configs: &[StrategyConfig],
    ) -> ComparisonTable {
        let rows = configs
            .iter()
            .map(|config| ComparisonRow {
                name: config.name.clone(),
                kelly_fraction: config.kelly_fraction,
                min_edge: config.min_edge,
                metrics: self.run(markets, config.kelly_fraction, config.min_edge),
            })
            .collect();
        ComparisonTable { rows }
    }

    /// Get all trades
    pub fn get_trades(&self) -> &[BacktestTrade] {
        &self.trades
    }

    /// Get equity curve
    pub fn get_equity_curve(&self) -> &[f64] {
        &self.equity_curve
    }

    /// Trade history as CSV with a header row
    pub fn export_trades_csv(&self) -> Result<String> {
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
        for trade in &self.trades {
            writer
                .serialize(trade)
                .context("Failed to serialize trade")?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;
        String::from_utf8(bytes).context("CSV output is not UTF-8")
    }

    /// Write the trade history to a CSV file
    pub fn write_trades_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
        for trade in &self.trades {
            writer.serialize(trade)?;
        }
        writer.flush()?;
        info!("Exported {} trades to {}", self.trades.len(), path.display());
        Ok(())
    }
}
