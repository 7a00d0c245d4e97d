//! Portfolio construction
//!
//! - Correlation matrix over realized position returns
//! - Mean-variance weights on the simplex with an equal-weight fallback
//! - Ledger statistics

pub mod correlation;
pub mod ledger;
pub mod optimizer;

pub use correlation::{
    closed_roi_series, pearson, CorrelatedPair, CorrelationKind, CorrelationMatrix,
    HistoricalPosition, PositionStatus,
};
pub use ledger::PortfolioStats;
pub use optimizer::{
    expected_bet_return, OptimizationResult, PortfolioConfig, PortfolioOptimizer,
    PositionSuggestion,
};

use serde::Serialize;

/// Diagnostics for a position ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationReport {
    pub matrix: CorrelationMatrix,
    pub diversification_ratio: f64,
    pub correlated_pairs: Vec<CorrelatedPair>,
}

impl PortfolioOptimizer {
    /// Correlation matrix, diversification ratio and flagged pairs in one pass
    pub fn analyze_correlations(
        &self,
        positions: &[HistoricalPosition],
    ) -> crate::types::Signal<CorrelationReport> {
        let threshold = self.config().correlation_threshold;
        CorrelationMatrix::from_positions(positions).map(|matrix| CorrelationReport {
            diversification_ratio: matrix.diversification_ratio(),
            correlated_pairs: matrix.correlated_pairs(threshold),
            matrix,
        })
    }
}
