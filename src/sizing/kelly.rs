use serde::{Deserialize, Serialize};

use crate::types::{is_valid_probability, BetRecommendation, NoSignalReason, Outcome, Signal};

/// Bet sizing knobs. Passed by value into every sizing call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingPolicy {
    /// Kelly multiplier in (0, 1] (0.25 = quarter Kelly)
    pub kelly_fraction: f64,
    /// Minimum edge required to bet
    pub min_edge: f64,
    pub min_bet: f64,
    pub max_bet: f64,
    /// Hard cap on the fraction of bankroll committed to one bet
    pub max_bankroll_fraction: f64,
    /// Maximum fraction of market liquidity a single bet may take
    pub impact_threshold: f64,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            kelly_fraction: 0.25,
            min_edge: 0.05,
            min_bet: 10.0,
            max_bet: 100.0,
            max_bankroll_fraction: 0.5,
            impact_threshold: 0.1,
        }
    }
}

impl SizingPolicy {
    pub fn with_kelly(mut self, kelly_fraction: f64, min_edge: f64) -> Self {
        self.kelly_fraction = kelly_fraction;
        self.min_edge = min_edge;
        self
    }

    pub fn with_bounds(mut self, min_bet: f64, max_bet: f64) -> Self {
        self.min_bet = min_bet;
        self.max_bet = max_bet;
        self
    }

    pub fn is_valid(&self) -> bool {
        let unit = |x: f64| x.is_finite() && x > 0.0 && x <= 1.0;
        unit(self.kelly_fraction)
            && unit(self.max_bankroll_fraction)
            && unit(self.impact_threshold)
            && self.min_edge.is_finite()
            && self.min_edge >= 0.0
            && self.min_bet.is_finite()
            && self.max_bet.is_finite()
            && self.min_bet >= 0.0
            && self.min_bet <= self.max_bet
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KellyQuote {
    pub direction: Outcome,
    pub edge: f64,
    /// Net payout odds for the chosen side
    pub b: f64,
    pub f_raw: f64,
    /// After the Kelly multiplier and bankroll cap
    pub f_fractional: f64,
}

/// Fractional Kelly for a binary market.
///
/// YES wins when `p - m >= min_edge`, otherwise NO when `m - p >= min_edge`.
pub fn compute_fractional_kelly(
    probability: f64,
    market_probability: f64,
    kelly_fraction: f64,
    min_edge: f64,
    max_bankroll_fraction: f64,
) -> Signal<KellyQuote> {
    if !is_valid_probability(probability) || !is_valid_probability(market_probability) {
        return Signal::NoSignal(NoSignalReason::InvalidProbability);
    }

    let edge_yes = probability - market_probability;
    let edge_no = (1.0 - probability) - (1.0 - market_probability);

    let (direction, edge, p_win, b) = if edge_yes >= min_edge {
        (
            Outcome::Yes,
            edge_yes,
            probability,
            (1.0 - market_probability) / market_probability,
        )
    } else if edge_no >= min_edge {
        (
            Outcome::No,
            edge_no,
            1.0 - probability,
            market_probability / (1.0 - market_probability),
        )
    } else {
        return Signal::NoSignal(NoSignalReason::InsufficientEdge);
    };

    let p_lose = 1.0 - p_win;
    let f_raw = (p_win * b - p_lose) / b;
    if !(f_raw > 0.0) {
        return Signal::NoSignal(NoSignalReason::NonPositiveKelly);
    }

    let f_fractional = (f_raw * kelly_fraction).clamp(0.0, max_bankroll_fraction);

    Signal::Found(KellyQuote {
        direction,
        edge,
        b,
        f_raw,
        f_fractional,
    })
}

/// Cap a bet at `impact_threshold` of market liquidity.
///
/// Returns `None` when liquidity is unusable.
pub fn adjust_for_market_impact(
    bet_size: f64,
    market_liquidity: f64,
    impact_threshold: f64,
) -> Option<f64> {
    if !market_liquidity.is_finite() || market_liquidity <= 0.0 {
        return None;
    }
    Some(bet_size.min(market_liquidity * impact_threshold))
}

/// Full sizing pipeline: Kelly fraction, bankroll cap, liquidity cap, bet bounds.
///
/// The caps take precedence over `min_bet`: when either cap sits below the
/// minimum bet the result is no-signal rather than an oversized bet.
pub fn calculate_optimal_bet(
    bankroll: f64,
    probability: f64,
    market_probability: f64,
    market_liquidity: f64,
    policy: &SizingPolicy,
) -> Signal<BetRecommendation> {
    if !policy.is_valid() {
        return Signal::NoSignal(NoSignalReason::InvalidPolicy);
    }
    if !bankroll.is_finite() || bankroll <= 0.0 {
        return Signal::NoSignal(NoSignalReason::InvalidBankroll);
    }

    let quote = match compute_fractional_kelly(
        probability,
        market_probability,
        policy.kelly_fraction,
        policy.min_edge,
        policy.max_bankroll_fraction,
    ) {
        Signal::Found(q) => q,
        Signal::NoSignal(reason) => return Signal::NoSignal(reason),
    };

    let raw_amount = bankroll * quote.f_fractional;
    let Some(amount) =
        adjust_for_market_impact(raw_amount, market_liquidity, policy.impact_threshold)
    else {
        return Signal::NoSignal(NoSignalReason::InvalidLiquidity);
    };

    // The minimum bet must itself fit under the liquidity cap
    let liquidity_cap = market_liquidity * policy.impact_threshold;
    if liquidity_cap < policy.min_bet {
        return Signal::NoSignal(NoSignalReason::LiquidityTooThin);
    }
    if bankroll * policy.max_bankroll_fraction < policy.min_bet {
        return Signal::NoSignal(NoSignalReason::BankrollTooSmall);
    }

    let amount = amount.clamp(policy.min_bet, policy.max_bet);

    Signal::Found(BetRecommendation {
        direction: quote.direction,
        amount,
        kelly_fraction: quote.f_fractional,
        edge: quote.edge,
        probability,
        market_probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kelly_zero_when_negative_edge() {
        let q = compute_fractional_kelly(0.45, 0.50, 0.25, 0.01, 0.5);
        // NO side has edge 0.05 here; YES never chosen
        assert_eq!(q.found().unwrap().direction, Outcome::No);

        let q = compute_fractional_kelly(0.49, 0.50, 0.25, 0.05, 0.5);
        assert_eq!(q.reason(), Some(NoSignalReason::InsufficientEdge));
    }

    #[test]
    fn test_rejects_boundary_probabilities() {
        for (p, m) in [(0.0, 0.5), (1.0, 0.5), (0.5, 0.0), (0.5, 1.0), (f64::NAN, 0.5)] {
            let q = compute_fractional_kelly(p, m, 0.25, 0.05, 0.5);
            assert_eq!(q.reason(), Some(NoSignalReason::InvalidProbability));
        }
    }

    #[test]
    fn test_reference_scenario() {
        let policy = SizingPolicy::default();
        let bet = calculate_optimal_bet(1000.0, 0.70, 0.50, 1000.0, &policy)
            .found()
            .unwrap();
        assert_eq!(bet.direction, Outcome::Yes);
        assert!((bet.edge - 0.20).abs() < 1e-9);
        // full kelly 0.4, quarter kelly 0.1 -> 100, liquidity cap 100, max bet 100
        assert!((bet.kelly_fraction - 0.1).abs() < 1e-9);
        assert!((bet.amount - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_direction() {
        let policy = SizingPolicy::default();
        let bet = calculate_optimal_bet(1000.0, 0.30, 0.50, 1000.0, &policy)
            .found()
            .unwrap();
        assert_eq!(bet.direction, Outcome::No);
        assert!((bet.edge - 0.20).abs() < 1e-9);
        assert!(bet.amount <= 100.0);
    }

    #[test]
    fn test_bankroll_fraction_hard_cap() {
        // p=0.99 vs m=0.10 gives a huge full-kelly fraction; full multiplier
        let q = compute_fractional_kelly(0.99, 0.10, 1.0, 0.05, 0.5)
            .found()
            .unwrap();
        assert!(q.f_raw > 0.5);
        assert_eq!(q.f_fractional, 0.5);
    }

    #[test]
    fn test_liquidity_cap_binds() {
        let policy = SizingPolicy::default().with_bounds(1.0, 1000.0);
        let bet = calculate_optimal_bet(10_000.0, 0.80, 0.50, 200.0, &policy)
            .found()
            .unwrap();
        assert!((bet.amount - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_bet_floor() {
        let policy = SizingPolicy::default();
        // 0.25 * small kelly * 100 bankroll is below the 10 floor
        let bet = calculate_optimal_bet(100.0, 0.60, 0.50, 10_000.0, &policy)
            .found()
            .unwrap();
        assert_eq!(bet.amount, 10.0);
    }

    #[test]
    fn test_min_bet_never_exceeds_bankroll_cap() {
        let policy = SizingPolicy::default();
        // cap is 0.5 * 5 = 2.5, below the 10 minimum
        let s = calculate_optimal_bet(5.0, 0.70, 0.50, 10_000.0, &policy);
        assert_eq!(s.reason(), Some(NoSignalReason::BankrollTooSmall));

        // exactly at the cap is still allowed
        let bet = calculate_optimal_bet(20.0, 0.70, 0.50, 10_000.0, &policy)
            .found()
            .unwrap();
        assert!(bet.amount <= 20.0 * policy.max_bankroll_fraction + 1e-9);
    }

    #[test]
    fn test_thin_liquidity_is_no_signal() {
        let policy = SizingPolicy::default();
        let s = calculate_optimal_bet(1000.0, 0.70, 0.50, 50.0, &policy);
        assert_eq!(s.reason(), Some(NoSignalReason::LiquidityTooThin));
    }

    #[test]
    fn test_caller_input_guards() {
        let policy = SizingPolicy::default();
        assert_eq!(
            calculate_optimal_bet(0.0, 0.7, 0.5, 1000.0, &policy).reason(),
            Some(NoSignalReason::InvalidBankroll)
        );
        assert_eq!(
            calculate_optimal_bet(1000.0, 0.7, 0.5, 0.0, &policy).reason(),
            Some(NoSignalReason::InvalidLiquidity)
        );
        let bad = SizingPolicy::default().with_bounds(200.0, 100.0);
        assert_eq!(
            calculate_optimal_bet(1000.0, 0.7, 0.5, 1000.0, &bad).reason(),
            Some(NoSignalReason::InvalidPolicy)
        );
    }

    #[test]
    fn test_bounds_hold_over_grid() {
        let policy = SizingPolicy::default();
        for i in 1..20 {
            for j in 1..20 {
                let p = i as f64 / 20.0;
                let m = j as f64 / 20.0;
                for liquidity in [100.0, 500.0, 5000.0] {
                    match calculate_optimal_bet(1000.0, p, m, liquidity, &policy) {
                        Signal::Found(bet) => {
                            assert!(bet.amount >= policy.min_bet);
                            assert!(bet.amount <= policy.max_bet);
                            assert!(bet.amount <= 0.1 * liquidity + 1e-9);
                            let expected = if p > m { Outcome::Yes } else { Outcome::No };
                            assert_eq!(bet.direction, expected);
                        }
                        Signal::NoSignal(_) => {}
                    }
                    if (p - m).abs() < policy.min_edge - 1e-12 {
                        assert!(!calculate_optimal_bet(1000.0, p, m, liquidity, &policy)
                            .is_found());
                    }
                }
            }
        }
    }

    #[test]
    fn test_market_impact_adjustment() {
        assert_eq!(adjust_for_market_impact(500.0, 1000.0, 0.1), Some(100.0));
        assert_eq!(adjust_for_market_impact(50.0, 1000.0, 0.1), Some(50.0));
        assert_eq!(adjust_for_market_impact(50.0, -1.0, 0.1), None);
    }
}
