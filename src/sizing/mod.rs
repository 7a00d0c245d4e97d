//! Bet sizing
//!
//! Fractional Kelly with bankroll and liquidity caps, plus direct
//! mispricing detection for confidence-gated alerts.

pub mod kelly;
pub mod mispricing;

pub use kelly::{
    adjust_for_market_impact, calculate_optimal_bet, compute_fractional_kelly, KellyQuote,
    SizingPolicy,
};
pub use mispricing::{detect_mispricing, Mispricing};
