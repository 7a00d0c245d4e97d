use serde::Serialize;

use crate::types::{is_valid_probability, NoSignalReason, Outcome, Signal};

/// Edge at which mispricing confidence saturates at 1.0
pub const FULL_CONFIDENCE_EDGE: f64 = 0.3;

/// Direct comparison of our estimate against the market price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mispricing {
    pub direction: Outcome,
    pub edge: f64,
    pub confidence: f64,
    pub estimated_probability: f64,
    pub market_probability: f64,
    pub recommendation: String,
}

/// Flag a market whose price disagrees with our estimate by enough edge
/// to clear both the minimum edge and the minimum confidence.
pub fn detect_mispricing(
    estimated_probability: f64,
    market_probability: f64,
    min_confidence: f64,
    min_edge: f64,
) -> Signal<Mispricing> {
    if !is_valid_probability(estimated_probability) || !is_valid_probability(market_probability)
    {
        return Signal::NoSignal(NoSignalReason::InvalidProbability);
    }

    let edge = (estimated_probability - market_probability).abs();
    if edge < min_edge {
        return Signal::NoSignal(NoSignalReason::InsufficientEdge);
    }

    let confidence = (edge / FULL_CONFIDENCE_EDGE).min(1.0);
    if confidence < min_confidence {
        return Signal::NoSignal(NoSignalReason::LowConfidence);
    }

    let direction = if estimated_probability > market_probability {
        Outcome::Yes
    } else {
        Outcome::No
    };

    Signal::Found(Mispricing {
        direction,
        edge,
        confidence,
        estimated_probability,
        market_probability,
        recommendation: format!(
            "Bet {} - market mispriced by {:.1}%",
            direction,
            edge * 100.0
        ),
    })
}
