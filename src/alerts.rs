//! Structured alert records
//!
//! Alerts are built and kept in a bounded in-memory history. Delivery
//! (webhook, email) belongs to the notification collaborator, which reads
//! the returned [`Alert`] values.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use tracing::info;

use crate::arbitrage::ArbitrageOpportunity;
use crate::types::BetRecommendation;

const QUESTION_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TradingOpportunity,
    PnlMilestone,
    ArbitrageOpportunity,
    PortfolioWarning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Bounded alert history, oldest dropped first
#[derive(Debug, Clone)]
pub struct AlertLog {
    history: VecDeque<Alert>,
    capacity: usize,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, kind: AlertKind, message: String, data: Value) -> &Alert {
        info!(kind = ?kind, %message, "alert");
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(Alert {
            kind,
            message,
            data,
            created_at: Utc::now(),
        });
        &self.history[self.history.len() - 1]
    }

    pub fn trading_opportunity(&mut self, question: &str, bet: &BetRecommendation) -> &Alert {
        let preview: String = question.chars().take(QUESTION_PREVIEW_CHARS).collect();
        self.push(
            AlertKind::TradingOpportunity,
            format!("High-edge opportunity detected: {}...", preview),
            json!({
                "market_question": question,
                "estimated_probability": bet.probability,
                "market_probability": bet.market_probability,
                "edge": bet.edge,
                "recommended_bet": bet.amount,
                "direction": bet.direction,
            }),
        )
    }

    pub fn pnl_milestone(&mut self, total_pnl: f64, roi: f64, milestone: &str) -> &Alert {
        self.push(
            AlertKind::PnlMilestone,
            format!("P&L Milestone: {}", milestone),
            json!({
                "total_pnl": total_pnl,
                "roi": roi,
                "milestone_type": milestone,
            }),
        )
    }

    pub fn arbitrage_opportunity(&mut self, opportunity: &ArbitrageOpportunity) -> &Alert {
        let label = match opportunity {
            ArbitrageOpportunity::Binary(_) => "binary_arbitrage",
            ArbitrageOpportunity::InverseMarket(_) => "inverse_market_arbitrage",
        };
        let data = serde_json::to_value(opportunity).unwrap_or(Value::Null);
        self.push(
            AlertKind::ArbitrageOpportunity,
            format!("Arbitrage detected: {}", label),
            data,
        )
    }

    pub fn portfolio_warning(&mut self, warning: &str, details: Value) -> &Alert {
        self.push(
            AlertKind::PortfolioWarning,
            format!("Portfolio Warning: {}", warning),
            details,
        )
    }

    /// Most recent alerts, oldest first
    pub fn history(&self, limit: usize) -> Vec<&Alert> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Outcome;

    #[test]
    fn test_history_is_bounded() {
        let mut log = AlertLog::new(2);
        log.pnl_milestone(10.0, 0.01, "first");
        log.pnl_milestone(20.0, 0.02, "second");
        log.pnl_milestone(30.0, 0.03, "third");
        assert_eq!(log.len(), 2);
        let recent = log.history(10);
        assert_eq!(recent[0].message, "P&L Milestone: second");
        assert_eq!(log.history(1)[0].data["milestone_type"], "third");
    }

    #[test]
    fn test_trading_alert_payload() {
        let mut log = AlertLog::default();
        let bet = BetRecommendation {
            direction: Outcome::Yes,
            amount: 50.0,
            kelly_fraction: 0.05,
            edge: 0.1,
            probability: 0.6,
            market_probability: 0.5,
        };
        let alert = log.trading_opportunity(&"x".repeat(150), &bet);
        assert_eq!(alert.kind, AlertKind::TradingOpportunity);
        assert_eq!(alert.data["direction"], "YES");
        assert!(alert.message.len() < 150);
    }

    #[test]
    fn test_warning_and_clear() {
        let mut log = AlertLog::default();
        log.portfolio_warning("high correlation", json!({ "pairs": 2 }));
        assert_eq!(log.history(5)[0].kind, AlertKind::PortfolioWarning);
        log.clear();
        assert!(log.is_empty());
    }
}
