//! Ledger summary statistics

use serde::Serialize;

use super::correlation::{HistoricalPosition, PositionStatus};

/// Aggregate view over a position ledger. Rates and ROI are fractions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PortfolioStats {
    pub total_trades: usize,
    pub open_trades: usize,
    pub closed_trades: usize,
    pub total_pnl: f64,
    /// Winning closed trades over all closed trades
    pub win_rate: f64,
    pub avg_edge: f64,
    pub total_invested: f64,
    pub roi: f64,
}

impl PortfolioStats {
    pub fn from_positions(positions: &[HistoricalPosition]) -> Self {
        if positions.is_empty() {
            return Self::default();
        }

        let closed: Vec<&HistoricalPosition> = positions
            .iter()
            .filter(|p| p.status == PositionStatus::Closed)
            .collect();
        let wins = closed.iter().filter(|p| p.pnl > 0.0).count();

        let total_pnl: f64 = positions.iter().map(|p| p.pnl).sum();
        let total_invested: f64 = positions.iter().map(|p| p.amount).sum();

        Self {
            total_trades: positions.len(),
            open_trades: positions.len() - closed.len(),
            closed_trades: closed.len(),
            total_pnl,
            win_rate: if closed.is_empty() {
                0.0
            } else {
                wins as f64 / closed.len() as f64
            },
            avg_edge: positions.iter().map(|p| p.edge).sum::<f64>() / positions.len() as f64,
            total_invested,
            roi: if total_invested > 0.0 {
                total_pnl / total_invested
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger() {
        assert_eq!(PortfolioStats::from_positions(&[]), PortfolioStats::default());
    }

    #[test]
    fn test_ledger_statistics() {
        let mut open = HistoricalPosition::closed("c", 50.0, 0.0);
        open.status = PositionStatus::Open;
        open.edge = 0.2;
        let mut win = HistoricalPosition::closed("a", 100.0, 40.0);
        win.edge = 0.1;
        let loss = HistoricalPosition::closed("b", 50.0, -50.0);

        let stats = PortfolioStats::from_positions(&[win, loss, open]);
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.open_trades, 1);
        assert_eq!(stats.closed_trades, 2);
        assert!((stats.total_pnl + 10.0).abs() < 1e-12);
        assert!((stats.win_rate - 0.5).abs() < 1e-12);
        assert!((stats.avg_edge - 0.1).abs() < 1e-12);
        assert!((stats.roi + 0.05).abs() < 1e-12);
    }
}
