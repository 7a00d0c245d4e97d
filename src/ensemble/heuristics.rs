//! Deterministic heuristic estimators
//!
//! None of these perform I/O. `None` means "no opinion".

const OPTIMISTIC_KEYWORDS: &[&str] = &["will", "success", "achieve", "reach", "exceed", "grow"];
const PESSIMISTIC_KEYWORDS: &[&str] = &["fail", "decline", "decrease", "not", "won't", "unable"];

/// Lowercased words with surrounding punctuation stripped (apostrophes kept)
fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_string()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// First four-digit year >= 2000 mentioned in the question
fn first_year(words: &[String]) -> Option<u32> {
    words
        .iter()
        .filter(|w| w.len() == 4 && w.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|w| w.parse::<u32>().ok())
        .find(|&y| y >= 2000)
}

/// Base-rate estimate from the question wording.
///
/// A year mention overrides keyword counting: near-term deadlines resolve
/// YES more often than distant ones.
pub fn base_rate_estimate(question: &str) -> f64 {
    let words = words(question);

    if let Some(year) = first_year(&words) {
        return if year <= 2026 {
            0.60
        } else if year <= 2030 {
            0.40
        } else {
            0.25
        };
    }

    let count = |keywords: &[&str]| {
        keywords
            .iter()
            .filter(|k| words.iter().any(|w| w == *k))
            .count()
    };
    let optimistic = count(OPTIMISTIC_KEYWORDS);
    let pessimistic = count(PESSIMISTIC_KEYWORDS);

    if pessimistic > optimistic {
        0.35
    } else if optimistic > pessimistic {
        0.65
    } else {
        0.50
    }
}

/// Volume tier multiplier used by the momentum estimator
pub fn momentum_factor(volume: f64) -> f64 {
    if volume > 1000.0 {
        1.0
    } else if volume > 500.0 {
        0.8
    } else if volume > 100.0 {
        0.6
    } else {
        0.4
    }
}

/// Push already-lopsided markets further in the direction they lean,
/// more so when volume is high.
pub fn market_momentum_estimate(probability: f64, volume: f64) -> Option<f64> {
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return None;
    }

    let factor = momentum_factor(volume);
    let adjusted = if probability > 0.7 {
        probability + (1.0 - probability) * factor * 0.1
    } else if probability < 0.3 {
        probability - probability * factor * 0.1
    } else {
        probability
    };

    Some(adjusted.clamp(0.01, 0.99))
}

/// Fade extremes: halve the excess above 0.8 or the deficit below 0.2
pub fn contrarian_estimate(probability: f64) -> Option<f64> {
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return None;
    }

    let estimate = if probability > 0.8 {
        0.8 - (probability - 0.8) * 0.5
    } else if probability < 0.2 {
        0.2 + (0.2 - probability) * 0.5
    } else {
        probability
    };

    Some(estimate)
}
