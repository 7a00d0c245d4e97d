//! Core types used throughout the engine
//!
//! Market snapshots, outcomes, probability estimates, bet recommendations,
//! allocation plans and the `Signal` result used for "nothing to do here".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProbabilityError;

/// Liquidity assumed for snapshots that carry no liquidity field
pub const DEFAULT_LIQUIDITY: f64 = 1000.0;

/// Binary market outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn opposite(&self) -> Self {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }

    /// Price of this side given the market-implied YES probability
    pub fn price_in(&self, market_probability: f64) -> f64 {
        match self {
            Outcome::Yes => market_probability,
            Outcome::No => 1.0 - market_probability,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
        }
    }
}

/// Point-in-time view of a binary market, as fetched by the data client.
///
/// The engine never mutates a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Market-implied YES probability (0-1)
    pub probability: f64,
    #[serde(default)]
    pub volume: f64,
    /// `None` when the data client did not report liquidity
    #[serde(default, alias = "totalLiquidity")]
    pub total_liquidity: Option<f64>,
    #[serde(default, alias = "isResolved")]
    pub is_resolved: bool,
    #[serde(default)]
    pub resolution: Option<Outcome>,
    #[serde(default, alias = "closeTime")]
    pub close_time: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    /// Open market with the given question and YES probability
    pub fn new(id: impl Into<String>, question: impl Into<String>, probability: f64) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            description: None,
            probability,
            volume: 0.0,
            total_liquidity: None,
            is_resolved: false,
            resolution: None,
            close_time: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_liquidity(mut self, liquidity: f64) -> Self {
        self.total_liquidity = Some(liquidity);
        self
    }

    /// Reported liquidity, or `default` when the field was absent.
    ///
    /// An explicit zero or negative value is returned as-is.
    pub fn liquidity_or(&self, default: f64) -> f64 {
        self.total_liquidity.unwrap_or(default)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn resolved(mut self, outcome: Outcome) -> Self {
        self.is_resolved = true;
        self.resolution = Some(outcome);
        self
    }

    /// Recorded outcome of a resolved market
    pub fn resolved_outcome(&self) -> Option<Outcome> {
        if self.is_resolved {
            self.resolution
        } else {
            None
        }
    }
}

/// True when `p` can be used in Kelly or ensemble arithmetic
pub fn is_valid_probability(p: f64) -> bool {
    p.is_finite() && p > 0.0 && p < 1.0
}

/// A probability strictly inside (0,1), tagged with the model that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbabilityEstimate {
    value: f64,
    source: String,
}

impl ProbabilityEstimate {
    /// Rejects values at or outside the open interval. Never clamps.
    pub fn new(value: f64, source: impl Into<String>) -> Result<Self, ProbabilityError> {
        let source = source.into();
        if !value.is_finite() {
            return Err(ProbabilityError::NonFinite { source_model: source });
        }
        if !is_valid_probability(value) {
            return Err(ProbabilityError::OutOfRange {
                value,
                source_model: source,
            });
        }
        Ok(Self { value, source })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Why a call produced nothing to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoSignalReason {
    /// Probability at or outside (0,1), or non-finite
    InvalidProbability,
    /// Neither side clears the minimum edge
    InsufficientEdge,
    /// Kelly formula yields no positive expectancy
    NonPositiveKelly,
    /// Bankroll or capital is zero, negative or non-finite
    InvalidBankroll,
    /// Market liquidity is zero, negative or non-finite
    InvalidLiquidity,
    /// Liquidity cap sits below the minimum bet
    LiquidityTooThin,
    /// Bankroll cap sits below the minimum bet
    BankrollTooSmall,
    /// Policy knobs out of range (e.g. min bet above max bet)
    InvalidPolicy,
    /// Not enough closed positions to estimate correlations
    InsufficientHistory,
    /// Edge too small relative to the confidence requirement
    LowConfidence,
    /// Markets are not an inverse (negated) pair
    NotInverse,
    /// Prices agree within the profit threshold
    NoDiscrepancy,
}

impl fmt::Display for NoSignalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoSignalReason::InvalidProbability => "invalid probability",
            NoSignalReason::InsufficientEdge => "insufficient edge",
            NoSignalReason::NonPositiveKelly => "non-positive kelly fraction",
            NoSignalReason::InvalidBankroll => "invalid bankroll",
            NoSignalReason::InvalidLiquidity => "invalid liquidity",
            NoSignalReason::LiquidityTooThin => "liquidity cap below minimum bet",
            NoSignalReason::BankrollTooSmall => "bankroll cap below minimum bet",
            NoSignalReason::InvalidPolicy => "invalid policy",
            NoSignalReason::InsufficientHistory => "insufficient history",
            NoSignalReason::LowConfidence => "low confidence",
            NoSignalReason::NotInverse => "not an inverse pair",
            NoSignalReason::NoDiscrepancy => "no price discrepancy",
        };
        write!(f, "{}", s)
    }
}

/// Result of a sizing, scan or estimation call.
///
/// `NoSignal` is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Signal<T> {
    Found(T),
    NoSignal(NoSignalReason),
}

impl<T> Signal<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Signal::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Signal::Found(v) => Some(v),
            Signal::NoSignal(_) => None,
        }
    }

    pub fn as_found(&self) -> Option<&T> {
        match self {
            Signal::Found(v) => Some(v),
            Signal::NoSignal(_) => None,
        }
    }

    pub fn reason(&self) -> Option<NoSignalReason> {
        match self {
            Signal::Found(_) => None,
            Signal::NoSignal(r) => Some(*r),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Signal<U> {
        match self {
            Signal::Found(v) => Signal::Found(f(v)),
            Signal::NoSignal(r) => Signal::NoSignal(r),
        }
    }
}

/// Single-opportunity bet produced by the Kelly sizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecommendation {
    pub direction: Outcome,
    /// Currency amount, within [min_bet, max_bet] and the liquidity cap
    pub amount: f64,
    /// Fraction of bankroll after the Kelly multiplier and bankroll cap
    pub kelly_fraction: f64,
    /// Edge in the chosen direction
    pub edge: f64,
    pub probability: f64,
    pub market_probability: f64,
}

impl BetRecommendation {
    /// Probability that the recommended side wins, under our estimate
    pub fn win_probability(&self) -> f64 {
        match self.direction {
            Outcome::Yes => self.probability,
            Outcome::No => 1.0 - self.probability,
        }
    }

    /// Price paid per unit payout for the recommended side
    pub fn entry_price(&self) -> f64 {
        self.direction.price_in(self.market_probability)
    }
}

/// One leg of an allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationLeg {
    pub market_id: String,
    pub direction: Outcome,
    pub amount: f64,
}

/// Capital split across one or more legs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub legs: Vec<AllocationLeg>,
    pub total_invested: f64,
    pub expected_profit: f64,
    /// Expected profit over total invested (fraction)
    pub roi: f64,
}

impl AllocationPlan {
    /// Single-leg plan for a Kelly bet, valued at our estimated probability
    pub fn from_bet(market_id: impl Into<String>, bet: &BetRecommendation) -> Signal<Self> {
        let price = bet.entry_price();
        if !is_valid_probability(price) || !(bet.amount > 0.0) {
            return Signal::NoSignal(NoSignalReason::InvalidProbability);
        }

        let p_win = bet.win_probability();
        let win_profit = bet.amount / price - bet.amount;
        let expected_profit = p_win * win_profit - (1.0 - p_win) * bet.amount;

        Signal::Found(Self {
            legs: vec![AllocationLeg {
                market_id: market_id.into(),
                direction: bet.direction,
                amount: bet.amount,
            }],
            total_invested: bet.amount,
            expected_profit,
            roi: expected_profit / bet.amount,
        })
    }
}
