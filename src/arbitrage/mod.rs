//! Structural mispricing scanner
//!
//! Two opportunity families:
//! - Binary: YES + NO implied total below 1 within a single market
//! - Inverse: a market and its negation priced off `p2 = 1 - p1`
//!
//! Related markets are grouped transitively first so pairwise checks only
//! run within groups.

pub mod related;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{
    is_valid_probability, AllocationLeg, AllocationPlan, MarketSnapshot, NoSignalReason, Outcome,
    Signal,
};

pub use related::{are_related, group_related, is_inverse_pair, is_negated, keywords};

/// Implied totals within this distance of 1 are treated as fairly priced
const BINARY_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Minimum discrepancy for an inverse-pair opportunity
    pub min_profit_threshold: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_profit_threshold: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryArbitrage {
    pub market_id: String,
    pub market_question: String,
    pub prob_yes: f64,
    pub prob_no: f64,
    pub implied_total: f64,
    pub potential_profit: f64,
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InverseArbitrage {
    pub market1_id: String,
    pub market1_question: String,
    pub market1_prob: f64,
    pub market2_id: String,
    pub market2_question: String,
    pub market2_prob: f64,
    pub discrepancy: f64,
    pub potential_profit: f64,
    /// Side to buy on both legs: YES when the pair is underpriced, NO when overpriced
    pub direction: Outcome,
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ArbitrageOpportunity {
    #[serde(rename = "binary_arbitrage")]
    Binary(BinaryArbitrage),
    #[serde(rename = "inverse_market_arbitrage")]
    InverseMarket(InverseArbitrage),
}

impl ArbitrageOpportunity {
    pub fn potential_profit(&self) -> f64 {
        match self {
            ArbitrageOpportunity::Binary(b) => b.potential_profit,
            ArbitrageOpportunity::InverseMarket(i) => i.potential_profit,
        }
    }

    pub fn strategy(&self) -> &str {
        match self {
            ArbitrageOpportunity::Binary(b) => &b.strategy,
            ArbitrageOpportunity::InverseMarket(i) => &i.strategy,
        }
    }

    pub fn market_ids(&self) -> Vec<&str> {
        match self {
            ArbitrageOpportunity::Binary(b) => vec![b.market_id.as_str()],
            ArbitrageOpportunity::InverseMarket(i) => {
                vec![i.market1_id.as_str(), i.market2_id.as_str()]
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArbitrageScanner {
    config: ScannerConfig,
}

impl ArbitrageScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Single-market YES + NO check.
    ///
    /// The NO price is derived as `1 - p_yes`, so the implied total is 1 and
    /// this never fires for a valid snapshot. Kept at face value until an
    /// independently observed NO price is available.
    pub fn detect_binary_arbitrage(&self, market: &MarketSnapshot) -> Signal<BinaryArbitrage> {
        let prob_yes = market.probability;
        if !is_valid_probability(prob_yes) {
            return Signal::NoSignal(NoSignalReason::InvalidProbability);
        }
        let prob_no = 1.0 - prob_yes;
        let implied_total = prob_yes + prob_no;

        if (implied_total - 1.0).abs() < BINARY_TOLERANCE || implied_total >= 1.0 {
            return Signal::NoSignal(NoSignalReason::NoDiscrepancy);
        }

        Signal::Found(BinaryArbitrage {
            market_id: market.id.clone(),
            market_question: market.question.clone(),
            prob_yes,
            prob_no,
            implied_total,
            potential_profit: 1.0 - implied_total,
            strategy: "Buy both YES and NO".to_string(),
        })
    }

    /// Pairwise check between a market and its negation
    pub fn detect_cross_market_arbitrage(
        &self,
        market1: &MarketSnapshot,
        market2: &MarketSnapshot,
    ) -> Signal<InverseArbitrage> {
        if !is_inverse_pair(&market1.question, &market2.question) {
            return Signal::NoSignal(NoSignalReason::NotInverse);
        }

        let (p1, p2) = (market1.probability, market2.probability);
        if !is_valid_probability(p1) || !is_valid_probability(p2) {
            return Signal::NoSignal(NoSignalReason::InvalidProbability);
        }

        let discrepancy = (p2 - (1.0 - p1)).abs();
        if discrepancy <= self.config.min_profit_threshold {
            return Signal::NoSignal(NoSignalReason::NoDiscrepancy);
        }

        let direction = if p1 + p2 < 1.0 {
            Outcome::Yes
        } else {
            Outcome::No
        };

        Signal::Found(InverseArbitrage {
            market1_id: market1.id.clone(),
            market1_question: market1.question.clone(),
            market1_prob: p1,
            market2_id: market2.id.clone(),
            market2_question: market2.question.clone(),
            market2_prob: p2,
            discrepancy,
            potential_profit: discrepancy,
            direction,
            strategy: format!("Bet YES on market with prob {:.2}", p1.min(1.0 - p2)),
        })
    }

    /// All opportunities across `markets`, highest potential profit first
    pub fn scan(&self, markets: &[MarketSnapshot]) -> Vec<ArbitrageOpportunity> {
        let mut opportunities: Vec<ArbitrageOpportunity> = markets
            .iter()
            .filter_map(|m| self.detect_binary_arbitrage(m).found())
            .map(ArbitrageOpportunity::Binary)
            .collect();

        let groups = group_related(markets);
        debug!(markets = markets.len(), groups = groups.len(), "related market groups");

        for group in &groups {
            for (k, &i) in group.iter().enumerate() {
                for &j in &group[k + 1..] {
                    if let Signal::Found(arb) =
                        self.detect_cross_market_arbitrage(&markets[i], &markets[j])
                    {
                        opportunities.push(ArbitrageOpportunity::InverseMarket(arb));
                    }
                }
            }
        }

        opportunities.sort_by(|a, b| b.potential_profit().total_cmp(&a.potential_profit()));

        if !opportunities.is_empty() {
            info!(
                count = opportunities.len(),
                best_profit = opportunities[0].potential_profit(),
                "arbitrage opportunities found"
            );
        }
        opportunities
    }

    /// Capital split for an opportunity. `None` for non-positive capital.
    pub fn allocate(
        &self,
        opportunity: &ArbitrageOpportunity,
        total_capital: f64,
    ) -> Option<AllocationPlan> {
        if !total_capital.is_finite() || total_capital <= 0.0 {
            return None;
        }

        match opportunity {
            ArbitrageOpportunity::Binary(b) => {
                if !(b.implied_total > 0.0) {
                    return None;
                }
                // Each side takes capital in proportion to the opposite side's price
                let yes = total_capital * (b.prob_no / b.implied_total);
                let no = total_capital * (b.prob_yes / b.implied_total);
                let expected_profit = total_capital * (1.0 - b.implied_total);
                Some(AllocationPlan {
                    legs: vec![
                        AllocationLeg {
                            market_id: b.market_id.clone(),
                            direction: Outcome::Yes,
                            amount: yes,
                        },
                        AllocationLeg {
                            market_id: b.market_id.clone(),
                            direction: Outcome::No,
                            amount: no,
                        },
                    ],
                    total_invested: yes + no,
                    expected_profit,
                    roi: expected_profit / total_capital,
                })
            }
            ArbitrageOpportunity::InverseMarket(i) => {
                let leg = total_capital / 2.0;
                let expected_profit = total_capital * i.potential_profit;
                Some(AllocationPlan {
                    legs: vec![
                        AllocationLeg {
                            market_id: i.market1_id.clone(),
                            direction: i.direction,
                            amount: leg,
                        },
                        AllocationLeg {
                            market_id: i.market2_id.clone(),
                            direction: i.direction,
                            amount: leg,
                        },
                    ],
                    total_invested: total_capital,
                    expected_profit,
                    roi: expected_profit / total_capital,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(p1: f64, p2: f64) -> (MarketSnapshot, MarketSnapshot) {
        (
            MarketSnapshot::new("m1", "Will the Fed cut interest rates in March?", p1),
            MarketSnapshot::new("m2", "Will the Fed not cut interest rates in March?", p2),
        )
    }

    #[test]
    fn test_binary_arbitrage_never_fires() {
        let scanner = ArbitrageScanner::default();
        for i in 1..1000 {
            let m = MarketSnapshot::new("m", "q", i as f64 / 1000.0);
            assert!(!scanner.detect_binary_arbitrage(&m).is_found());
        }
    }

    #[test]
    fn test_binary_rejects_invalid_probability() {
        let scanner = ArbitrageScanner::default();
        let m = MarketSnapshot::new("m", "q", 1.0);
        assert_eq!(
            scanner.detect_binary_arbitrage(&m).reason(),
            Some(NoSignalReason::InvalidProbability)
        );
    }

    #[test]
    fn test_inverse_pair_detected() {
        let scanner = ArbitrageScanner::default();
        let (a, b) = pair(0.60, 0.30);
        let arb = scanner.detect_cross_market_arbitrage(&a, &b).found().unwrap();
        assert!((arb.discrepancy - 0.10).abs() < 1e-9);
        assert_eq!(arb.direction, Outcome::Yes);
        assert_eq!(arb.strategy, "Bet YES on market with prob 0.60");
    }

    #[test]
    fn test_inverse_within_threshold_ignored() {
        let scanner = ArbitrageScanner::default();
        let (a, b) = pair(0.60, 0.41);
        assert_eq!(
            scanner.detect_cross_market_arbitrage(&a, &b).reason(),
            Some(NoSignalReason::NoDiscrepancy)
        );
    }

    #[test]
    fn test_non_inverse_pair_ignored() {
        let scanner = ArbitrageScanner::default();
        let a = MarketSnapshot::new("a", "Will the Fed cut interest rates in March?", 0.6);
        let b = MarketSnapshot::new("b", "Will the Fed cut interest rates in April?", 0.1);
        assert_eq!(
            scanner.detect_cross_market_arbitrage(&a, &b).reason(),
            Some(NoSignalReason::NotInverse)
        );
    }

    #[test]
    fn test_scan_ranks_by_profit() {
        let scanner = ArbitrageScanner::default();
        let markets = vec![
            MarketSnapshot::new("a", "Will the Fed cut interest rates in March?", 0.60),
            MarketSnapshot::new("b", "Will the Fed not cut interest rates in March?", 0.30),
            MarketSnapshot::new("c", "Will Bitcoin close above 100k this year?", 0.40),
            MarketSnapshot::new("d", "Will Bitcoin not close above 100k this year?", 0.75),
            MarketSnapshot::new("e", "Who wins the World Cup?", 0.20),
        ];
        let opps = scanner.scan(&markets);
        assert_eq!(opps.len(), 2);
        assert_eq!(opps[0].market_ids(), vec!["c", "d"]);
        assert!(opps[0].potential_profit() >= opps[1].potential_profit());
    }

    #[test]
    fn test_inverse_allocation_splits_evenly() {
        let scanner = ArbitrageScanner::default();
        let (a, b) = pair(0.60, 0.30);
        let opp = ArbitrageOpportunity::InverseMarket(
            scanner.detect_cross_market_arbitrage(&a, &b).found().unwrap(),
        );
        let plan = scanner.allocate(&opp, 1000.0).unwrap();
        assert_eq!(plan.legs.len(), 2);
        assert!((plan.legs[0].amount - 500.0).abs() < 1e-9);
        assert!((plan.total_invested - 1000.0).abs() < 1e-9);
        assert!((plan.expected_profit - 100.0).abs() < 1e-6);
        assert!(scanner.allocate(&opp, 0.0).is_none());
    }

    #[test]
    fn test_binary_allocation_weights_by_opposite_price() {
        let scanner = ArbitrageScanner::default();
        let opp = ArbitrageOpportunity::Binary(BinaryArbitrage {
            market_id: "m".to_string(),
            market_question: "q".to_string(),
            prob_yes: 0.45,
            prob_no: 0.50,
            implied_total: 0.95,
            potential_profit: 0.05,
            strategy: "Buy both YES and NO".to_string(),
        });
        let plan = scanner.allocate(&opp, 950.0).unwrap();
        let yes = plan.legs[0].amount;
        let no = plan.legs[1].amount;
        // YES gets 0.50/0.95 of capital, NO gets 0.45/0.95
        assert!((yes - 500.0).abs() < 1e-9);
        assert!((no - 450.0).abs() < 1e-9);
        assert!((yes / no - 0.50 / 0.45).abs() < 1e-9);
        assert!((plan.total_invested - 950.0).abs() < 1e-9);
        assert!((plan.expected_profit - 47.5).abs() < 1e-9);
        assert!((plan.roi - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_opportunity_serializes_with_type_tag() {
        let scanner = ArbitrageScanner::default();
        let (a, b) = pair(0.60, 0.30);
        let opp = ArbitrageOpportunity::InverseMarket(
            scanner.detect_cross_market_arbitrage(&a, &b).found().unwrap(),
        );
        let json = serde_json::to_value(&opp).unwrap();
        assert_eq!(json["type"], "inverse_market_arbitrage");
        assert_eq!(json["direction"], "YES");
    }
}
