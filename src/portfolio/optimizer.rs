//! Mean-variance portfolio optimizer
//!
//! Maximizes `rt * E[r] - (1 - rt) * Var` over the probability simplex
//! (weights >= 0, sum = 1) with accelerated projected gradient ascent. The
//! solve is capped at `max_iterations`; any failure falls back to equal weights.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::correlation::CorrelationMatrix;
use crate::error::OptimizerError;
use crate::types::{is_valid_probability, MarketSnapshot};

/// Portfolio optimizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub risk_free_rate: f64,
    /// 0 = minimum variance, 1 = maximum return
    pub risk_tolerance: f64,
    /// |correlation| at which a pair is flagged
    pub correlation_threshold: f64,
    pub max_iterations: usize,
    /// Convergence tolerance on the projected gradient step (max abs component)
    pub tolerance: f64,
    /// Std dev used for series with zero spread (or no history)
    pub zero_spread_floor: f64,
    /// Off-diagonal correlation assumed when no history exists
    pub baseline_correlation: f64,
    /// Risk tolerance used for history-free position suggestions
    pub suggestion_risk_tolerance: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            risk_tolerance: 0.5,
            correlation_threshold: 0.7,
            max_iterations: 1000,
            tolerance: 1e-9,
            zero_spread_floor: 0.1,
            baseline_correlation: 0.1,
            suggestion_risk_tolerance: 0.6,
        }
    }
}

/// Optimal weights plus portfolio summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub sharpe_ratio: f64,
    pub iterations: usize,
    /// Set when the solve failed and equal weights were used instead
    pub degraded: Option<OptimizerError>,
}

impl OptimizationResult {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Suggested allocation for one candidate market
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSuggestion {
    pub market_id: String,
    pub market_question: String,
    pub weight: f64,
    pub suggested_size: f64,
    pub expected_return: f64,
}

/// Expected return per unit staked on the side our estimate favours
pub fn expected_bet_return(probability: f64, market_probability: f64) -> Option<f64> {
    if !is_valid_probability(probability) || !is_valid_probability(market_probability) {
        return None;
    }
    Some(if probability >= market_probability {
        probability / market_probability - 1.0
    } else {
        (1.0 - probability) / (1.0 - market_probability) - 1.0
    })
}

/// Euclidean projection onto the probability simplex
fn project_simplex(v: &Array1<f64>) -> Array1<f64> {
    let mut sorted: Vec<f64> = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, u) in sorted.iter().enumerate() {
        cumulative += u;
        let t = (cumulative - 1.0) / (i + 1) as f64;
        if u - t > 0.0 {
            theta = t;
        }
    }

    v.mapv(|x| (x - theta).max(0.0))
}

/// Population std dev
fn std_dev(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    (series.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt()
}

pub struct PortfolioOptimizer {
    config: PortfolioConfig,
}

impl PortfolioOptimizer {
    pub fn new(config: PortfolioConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    /// Per-asset volatility. Without a matching history every asset gets the floor.
    pub fn std_devs(&self, n: usize, return_series: Option<&[Vec<f64>]>) -> Array1<f64> {
        let floor = self.config.zero_spread_floor;
        match return_series {
            Some(series) if series.len() == n => series
                .iter()
                .map(|s| {
                    let sd = std_dev(s);
                    if sd > 0.0 && sd.is_finite() {
                        sd
                    } else {
                        floor
                    }
                })
                .collect(),
            _ => Array1::from_elem(n, floor),
        }
    }

    /// `w' (s s' * C) w`, floored at zero
    pub fn portfolio_variance(
        weights: &Array1<f64>,
        std_devs: &Array1<f64>,
        correlation: &Array2<f64>,
    ) -> f64 {
        let covariance = Self::covariance(std_devs, correlation);
        weights.dot(&covariance.dot(weights)).max(0.0)
    }

    fn covariance(std_devs: &Array1<f64>, correlation: &Array2<f64>) -> Array2<f64> {
        Array2::from_shape_fn(correlation.dim(), |(i, j)| {
            std_devs[i] * std_devs[j] * correlation[[i, j]]
        })
    }

    /// Raw constrained solve. Returns the weights and iterations used.
    pub fn solve(
        &self,
        expected_returns: &[f64],
        correlation: &Array2<f64>,
        return_series: Option<&[Vec<f64>]>,
        risk_tolerance: f64,
    ) -> Result<(Array1<f64>, usize), OptimizerError> {
        let n = expected_returns.len();
        if n == 0 {
            return Err(OptimizerError::Empty);
        }
        let (rows, cols) = correlation.dim();
        if rows != n || cols != n {
            return Err(OptimizerError::DimensionMismatch {
                returns: n,
                rows,
                cols,
            });
        }
        if !risk_tolerance.is_finite()
            || expected_returns.iter().any(|r| !r.is_finite())
            || correlation.iter().any(|c| !c.is_finite())
        {
            return Err(OptimizerError::NonFiniteInput);
        }

        let rt = risk_tolerance.clamp(0.0, 1.0);
        let mu = Array1::from(expected_returns.to_vec());
        let covariance = Self::covariance(&self.std_devs(n, return_series), correlation);

        // Lipschitz bound of the gradient via max absolute row sum
        let row_bound = covariance
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|c| c.abs()).sum::<f64>())
            .fold(0.0, f64::max);
        let lipschitz = 2.0 * (1.0 - rt) * row_bound;
        let step = if lipschitz > 1e-12 { 1.0 / lipschitz } else { 1.0 };

        // Accelerated projected gradient (FISTA) with gradient-based restart.
        // Stops when the extrapolated point is a fixed point of the
        // projected step, i.e. the projected gradient residual is below tolerance.
        let mut weights = Array1::from_elem(n, 1.0 / n as f64);
        let mut lookahead = weights.clone();
        let mut momentum = 1.0_f64;
        for iteration in 1..=self.config.max_iterations {
            let gradient = &mu * rt - covariance.dot(&lookahead) * (2.0 * (1.0 - rt));
            let next = project_simplex(&(&lookahead + &(gradient * step)));
            if next.iter().any(|w| !w.is_finite()) {
                return Err(OptimizerError::NonFiniteOutput);
            }

            let residual = (&next - &lookahead)
                .iter()
                .fold(0.0_f64, |acc, d| acc.max(d.abs()));
            if residual < self.config.tolerance {
                return Ok((next, iteration));
            }

            let restart = (&lookahead - &next).dot(&(&next - &weights)) > 0.0;
            if restart {
                momentum = 1.0;
                lookahead = next.clone();
            } else {
                let following = (1.0 + (1.0 + 4.0 * momentum * momentum).sqrt()) / 2.0;
                lookahead = &next + &((&next - &weights) * ((momentum - 1.0) / following));
                momentum = following;
            }
            weights = next;
        }

        Err(OptimizerError::NonConvergence {
            iterations: self.config.max_iterations,
        })
    }

    /// Mean-variance weights. Never fails: degraded solves use equal weights.
    pub fn optimize_weights(
        &self,
        expected_returns: &[f64],
        correlation: &Array2<f64>,
        return_series: Option<&[Vec<f64>]>,
        risk_tolerance: f64,
    ) -> OptimizationResult {
        let n = expected_returns.len();
        if n == 0 {
            return OptimizationResult {
                weights: Vec::new(),
                expected_return: 0.0,
                variance: 0.0,
                std_dev: 0.0,
                sharpe_ratio: 0.0,
                iterations: 0,
                degraded: Some(OptimizerError::Empty),
            };
        }

        let equal = Array1::from_elem(n, 1.0 / n as f64);
        let (weights, iterations, degraded) =
            match self.solve(expected_returns, correlation, return_series, risk_tolerance) {
                Ok((w, iterations)) => {
                    let clipped = w.mapv(|x| x.clamp(0.0, 1.0));
                    let total = clipped.sum();
                    if total > 0.0 {
                        (clipped / total, iterations, None)
                    } else {
                        (equal, iterations, Some(OptimizerError::NonFiniteOutput))
                    }
                }
                Err(e) => {
                    warn!(error = %e, assets = n, "portfolio optimization degraded to equal weights");
                    (equal, 0, Some(e))
                }
            };

        let mu = Array1::from(expected_returns.to_vec());
        let expected_return = weights.dot(&mu);
        let variance = if correlation.dim() == (n, n) {
            Self::portfolio_variance(&weights, &self.std_devs(n, return_series), correlation)
        } else {
            0.0
        };
        let variance = if variance.is_finite() { variance } else { 0.0 };
        let std_dev = variance.sqrt();
        let sharpe_ratio = if std_dev > 0.0 {
            (expected_return - self.config.risk_free_rate) / std_dev
        } else {
            0.0
        };

        debug!(
            assets = n,
            iterations,
            expected_return,
            variance,
            "portfolio optimized"
        );

        OptimizationResult {
            weights: weights.to_vec(),
            expected_return,
            variance,
            std_dev,
            sharpe_ratio,
            iterations,
            degraded,
        }
    }

    /// Optimize against a labelled matrix with the configured risk tolerance
    pub fn optimize(
        &self,
        expected_returns: &[f64],
        correlation: &CorrelationMatrix,
    ) -> OptimizationResult {
        self.optimize_weights(
            expected_returns,
            correlation.values(),
            None,
            self.config.risk_tolerance,
        )
    }

    /// Position sizes for candidates without shared history, using a
    /// synthetic baseline correlation.
    pub fn suggest_position_sizes(
        &self,
        markets: &[MarketSnapshot],
        total_capital: f64,
        expected_returns: &[f64],
    ) -> Vec<PositionSuggestion> {
        if markets.is_empty() || markets.len() != expected_returns.len() {
            return Vec::new();
        }
        if !total_capital.is_finite() || total_capital <= 0.0 {
            return Vec::new();
        }

        let labels = markets.iter().map(|m| m.id.clone()).collect();
        let correlation = CorrelationMatrix::uniform(labels, self.config.baseline_correlation);
        let result = self.optimize_weights(
            expected_returns,
            correlation.values(),
            None,
            self.config.suggestion_risk_tolerance,
        );

        markets
            .iter()
            .zip(result.weights.iter())
            .zip(expected_returns.iter())
            .map(|((market, &weight), &expected_return)| PositionSuggestion {
                market_id: market.id.clone(),
                market_question: market.question.clone(),
                weight,
                suggested_size: total_capital * weight,
                expected_return,
            })
            .collect()
    }
}

impl Default for PortfolioOptimizer {
    fn default() -> Self {
        Self::new(PortfolioConfig::default())
    }
}
