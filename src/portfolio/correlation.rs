//! Correlation analysis across markets
//!
//! Builds a correlation matrix from realized ROI on closed positions and
//! derives diversification and correlated-pair diagnostics.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::CorrelationError;
use crate::types::{NoSignalReason, Outcome, Signal};

/// Minimum closed observations per market before it enters the matrix
pub const MIN_OBSERVATIONS_PER_MARKET: usize = 2;

const DIAGONAL_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// A position from the trade ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPosition {
    pub market_id: String,
    pub direction: Outcome,
    pub amount: f64,
    pub pnl: f64,
    #[serde(default)]
    pub edge: f64,
    pub status: PositionStatus,
}

impl HistoricalPosition {
    pub fn closed(market_id: impl Into<String>, amount: f64, pnl: f64) -> Self {
        Self {
            market_id: market_id.into(),
            direction: Outcome::Yes,
            amount,
            pnl,
            edge: 0.0,
            status: PositionStatus::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == PositionStatus::Closed
    }

    /// Realized return on the amount staked; 0 for non-positive amounts
    pub fn roi(&self) -> f64 {
        if self.amount > 0.0 {
            self.pnl / self.amount
        } else {
            0.0
        }
    }
}

/// Realized ROI series per market, in first-seen order.
///
/// Only markets with at least [`MIN_OBSERVATIONS_PER_MARKET`] closed
/// positions are kept.
pub fn closed_roi_series(positions: &[HistoricalPosition]) -> Vec<(String, Vec<f64>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut series: Vec<(String, Vec<f64>)> = Vec::new();

    for pos in positions {
        let idx = *index.entry(pos.market_id.as_str()).or_insert_with(|| {
            series.push((pos.market_id.clone(), Vec::new()));
            series.len() - 1
        });
        if pos.is_closed() {
            series[idx].1.push(pos.roi());
        }
    }

    series
        .into_iter()
        .filter(|(_, r)| r.len() >= MIN_OBSERVATIONS_PER_MARKET)
        .collect()
}

/// Pearson correlation over the overlapping prefix of two series.
///
/// Returns 0 when either side has no spread.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    if len < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..len], &b[..len]);

    let mean_a = a.iter().sum::<f64>() / len as f64;
    let mean_b = b.iter().sum::<f64>() / len as f64;

    let mut numerator = 0.0;
    let mut denom_a = 0.0;
    let mut denom_b = 0.0;
    for i in 0..len {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        numerator += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    let denominator = (denom_a * denom_b).sqrt();
    if denominator > 0.0 {
        (numerator / denominator).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationKind {
    Positive,
    Negative,
}

/// Market pair whose absolute correlation crossed the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub market_a: String,
    pub market_b: String,
    pub correlation: f64,
    pub kind: CorrelationKind,
}

/// Labelled correlation matrix: square, unit diagonal, entries in [-1, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    labels: Vec<String>,
    values: Array2<f64>,
}

impl CorrelationMatrix {
    pub fn new(labels: Vec<String>, values: Array2<f64>) -> Result<Self, CorrelationError> {
        let (rows, cols) = values.dim();
        if rows != cols {
            return Err(CorrelationError::NotSquare { rows, cols });
        }
        if labels.len() != rows {
            return Err(CorrelationError::LabelMismatch {
                labels: labels.len(),
                size: rows,
            });
        }
        for ((row, col), &value) in values.indexed_iter() {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(CorrelationError::OutOfRange { row, col, value });
            }
            if row == col && (value - 1.0).abs() > DIAGONAL_TOLERANCE {
                return Err(CorrelationError::NonUnitDiagonal { index: row, value });
            }
        }
        Ok(Self { labels, values })
    }

    pub fn identity(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            values: Array2::eye(n),
        }
    }

    /// Synthetic matrix: unit diagonal, `off_diagonal` everywhere else
    pub fn uniform(labels: Vec<String>, off_diagonal: f64) -> Self {
        let n = labels.len();
        let c = off_diagonal.clamp(-1.0, 1.0);
        let values = Array2::from_shape_fn((n, n), |(i, j)| if i == j { 1.0 } else { c });
        Self { labels, values }
    }

    /// Correlation of realized ROI across markets with enough closed history.
    ///
    /// Needs at least two qualifying markets.
    pub fn from_positions(positions: &[HistoricalPosition]) -> Signal<Self> {
        let series = closed_roi_series(positions);
        if series.len() < 2 {
            return Signal::NoSignal(NoSignalReason::InsufficientHistory);
        }

        let n = series.len();
        let values = Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                1.0
            } else {
                pearson(&series[i].1, &series[j].1)
            }
        });
        let labels = series.into_iter().map(|(id, _)| id).collect();

        Signal::Found(Self { labels, values })
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Correlation between two markets by id
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        Some(self.values[[i, j]])
    }

    /// 1 - mean off-diagonal correlation, clipped to [0, 1]; 0 below two assets
    pub fn diversification_ratio(&self) -> f64 {
        let n = self.size();
        if n < 2 {
            return 0.0;
        }
        let off_diagonal: f64 = self
            .values
            .indexed_iter()
            .filter(|((i, j), _)| i != j)
            .map(|(_, v)| *v)
            .sum();
        let avg = off_diagonal / (n * (n - 1)) as f64;
        (1.0 - avg).clamp(0.0, 1.0)
    }

    /// Pairs with |correlation| >= threshold, strongest first
    pub fn correlated_pairs(&self, threshold: f64) -> Vec<CorrelatedPair> {
        let n = self.size();
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let correlation = self.values[[i, j]];
                if correlation.abs() >= threshold {
                    pairs.push(CorrelatedPair {
                        market_a: self.labels[i].clone(),
                        market_b: self.labels[j].clone(),
                        correlation,
                        kind: if correlation > 0.0 {
                            CorrelationKind::Positive
                        } else {
                            CorrelationKind::Negative
                        },
                    });
                }
            }
        }
        pairs.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("m{}", i)).collect()
    }

    #[test]
    fn test_correlation_calculation() {
        let a = [0.1, 0.2, 0.3, 0.4];
        let b = [0.2, 0.4, 0.6, 0.8];
        let c = [0.4, 0.3, 0.2, 0.1];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
        assert!((pearson(&a, &c) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&a, &[0.5, 0.5, 0.5, 0.5]), 0.0);
    }

    #[test]
    fn test_insufficient_history() {
        let positions = vec![
            HistoricalPosition::closed("a", 10.0, 5.0),
            HistoricalPosition::closed("a", 10.0, -10.0),
            HistoricalPosition::closed("b", 10.0, 2.0),
        ];
        let s = CorrelationMatrix::from_positions(&positions);
        assert_eq!(s.reason(), Some(NoSignalReason::InsufficientHistory));
    }

    #[test]
    fn test_open_positions_ignored() {
        let mut open = HistoricalPosition::closed("b", 10.0, 0.0);
        open.status = PositionStatus::Open;
        let positions = vec![
            HistoricalPosition::closed("a", 10.0, 5.0),
            HistoricalPosition::closed("a", 10.0, -10.0),
            HistoricalPosition::closed("b", 10.0, 2.0),
            open,
        ];
        assert!(!CorrelationMatrix::from_positions(&positions).is_found());
    }

    #[test]
    fn test_identical_series_fully_correlated() {
        let positions = vec![
            HistoricalPosition::closed("a", 10.0, 5.0),
            HistoricalPosition::closed("b", 20.0, 10.0),
            HistoricalPosition::closed("a", 10.0, -10.0),
            HistoricalPosition::closed("b", 20.0, -20.0),
        ];
        let m = CorrelationMatrix::from_positions(&positions).found().unwrap();
        assert_eq!(m.labels(), &["a".to_string(), "b".to_string()]);
        assert!((m.get("a", "b").unwrap() - 1.0).abs() < 1e-12);
        assert!(m.diversification_ratio().abs() < 1e-12);
    }

    #[test]
    fn test_diversification_extremes() {
        let identity = CorrelationMatrix::identity(labels(3));
        assert_eq!(identity.diversification_ratio(), 1.0);
        let ones = CorrelationMatrix::uniform(labels(3), 1.0);
        assert_eq!(ones.diversification_ratio(), 0.0);
        assert_eq!(CorrelationMatrix::identity(labels(1)).diversification_ratio(), 0.0);
    }

    #[test]
    fn test_correlated_pairs_sorted() {
        let values = array![[1.0, 0.75, -0.9], [0.75, 1.0, 0.1], [-0.9, 0.1, 1.0]];
        let m = CorrelationMatrix::new(labels(3), values).unwrap();
        let pairs = m.correlated_pairs(0.7);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].kind, CorrelationKind::Negative);
        assert_eq!(pairs[0].market_b, "m2");
        assert_eq!(pairs[1].kind, CorrelationKind::Positive);
    }

    #[test]
    fn test_matrix_validation() {
        let bad_diag = array![[0.5, 0.0], [0.0, 1.0]];
        assert!(matches!(
            CorrelationMatrix::new(labels(2), bad_diag),
            Err(CorrelationError::NonUnitDiagonal { index: 0, .. })
        ));
        let out_of_range = array![[1.0, 1.5], [1.5, 1.0]];
        assert!(matches!(
            CorrelationMatrix::new(labels(2), out_of_range),
            Err(CorrelationError::OutOfRange { .. })
        ));
        let not_square = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            CorrelationMatrix::new(labels(2), not_square),
            Err(CorrelationError::NotSquare { rows: 2, cols: 3 })
        ));
    }
}
