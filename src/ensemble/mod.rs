//! Probability Ensemble
//!
//! Fuses an optional external estimate (LLM collaborator) with three
//! deterministic heuristics:
//! - Base rate from question wording
//! - Market momentum
//! - Contrarian fade of extremes
//!
//! Weights are renormalized over the models that actually produced a value.

pub mod calibration;
pub mod heuristics;

pub use calibration::{score_predictions, PerformanceTracker, PredictionScore};
pub use heuristics::{base_rate_estimate, contrarian_estimate, market_momentum_estimate};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

use crate::types::{is_valid_probability, MarketSnapshot};

/// Models participating in the ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "llm")]
    External,
    #[serde(rename = "base_rate")]
    BaseRate,
    #[serde(rename = "market_momentum")]
    Momentum,
    #[serde(rename = "contrarian")]
    Contrarian,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::External,
        ModelKind::BaseRate,
        ModelKind::Momentum,
        ModelKind::Contrarian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::External => "llm",
            ModelKind::BaseRate => "base_rate",
            ModelKind::Momentum => "market_momentum",
            ModelKind::Contrarian => "contrarian",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        ModelKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// External probability source, e.g. an LLM client.
///
/// Returning `None` means "no opinion" and is never treated as an error.
/// `description` is empty when the market has none.
#[cfg_attr(test, mockall::automock)]
pub trait ProbabilityEstimator {
    fn estimate(&self, question: &str, description: &str) -> Option<f64>;
}

/// Adapts a closure into a [`ProbabilityEstimator`]
pub struct FnEstimator<F>(pub F);

impl<F> ProbabilityEstimator for FnEstimator<F>
where
    F: Fn(&str, &str) -> Option<f64>,
{
    fn estimate(&self, question: &str, description: &str) -> Option<f64> {
        (self.0)(question, description)
    }
}

/// Anything that can turn a market snapshot into a YES probability
pub trait MarketEstimator {
    fn estimate_market(&self, market: &MarketSnapshot) -> Option<f64>;
}

/// Uses only the external estimator, ignoring the heuristics
pub struct ExternalOnly<E>(pub E);

impl<E: ProbabilityEstimator> MarketEstimator for ExternalOnly<E> {
    fn estimate_market(&self, market: &MarketSnapshot) -> Option<f64> {
        self.0.estimate(
            &market.question,
            market.description.as_deref().unwrap_or(""),
        )
    }
}

/// Ensemble weights per model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    #[serde(rename = "llm")]
    pub external: f64,
    pub base_rate: f64,
    #[serde(rename = "market_momentum")]
    pub momentum: f64,
    pub contrarian: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            external: 0.5,
            base_rate: 0.2,
            momentum: 0.15,
            contrarian: 0.15,
        }
    }
}

impl EnsembleWeights {
    pub fn weight(&self, kind: ModelKind) -> f64 {
        match kind {
            ModelKind::External => self.external,
            ModelKind::BaseRate => self.base_rate,
            ModelKind::Momentum => self.momentum,
            ModelKind::Contrarian => self.contrarian,
        }
    }

    fn set(&mut self, kind: ModelKind, value: f64) {
        match kind {
            ModelKind::External => self.external = value,
            ModelKind::BaseRate => self.base_rate = value,
            ModelKind::Momentum => self.momentum = value,
            ModelKind::Contrarian => self.contrarian = value,
        }
    }

    pub fn total(&self) -> f64 {
        ModelKind::ALL.iter().map(|k| self.weight(*k)).sum()
    }

    pub fn normalize(&mut self) {
        let total = self.total();
        if total > 0.0 {
            for kind in ModelKind::ALL {
                self.set(kind, self.weight(kind) / total);
            }
        }
    }

    /// Weights proportional to historical accuracy scores.
    ///
    /// Models missing from `performance` get weight 0. Negative or
    /// non-finite scores count as 0. Returns `None` when nothing is positive.
    pub fn from_performance(performance: &HashMap<ModelKind, f64>) -> Option<Self> {
        let score = |k: ModelKind| {
            performance
                .get(&k)
                .copied()
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(0.0)
        };
        let total: f64 = ModelKind::ALL.iter().map(|k| score(*k)).sum();
        if !(total > 0.0) {
            return None;
        }

        let mut weights = Self {
            external: 0.0,
            base_rate: 0.0,
            momentum: 0.0,
            contrarian: 0.0,
        };
        for kind in ModelKind::ALL {
            weights.set(kind, score(kind) / total);
        }
        Some(weights)
    }

    pub fn is_valid(&self) -> bool {
        ModelKind::ALL
            .iter()
            .all(|k| self.weight(*k).is_finite() && self.weight(*k) >= 0.0)
            && self.total() > 0.0
    }
}

/// Fused estimate for one market
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleResult {
    pub probability: f64,
    /// 1 / (1 + 10 * variance)
    pub confidence: f64,
    /// Population variance across contributing models
    pub variance: f64,
    /// 1 - variance
    pub agreement: f64,
    /// Individual estimate per contributing model
    pub predictions: BTreeMap<ModelKind, f64>,
}

/// Weighted average of the estimates plus their population variance.
///
/// Falls back to `fallback` when no estimate carries weight.
pub fn fuse(
    predictions: &BTreeMap<ModelKind, f64>,
    weights: &EnsembleWeights,
    fallback: f64,
) -> (f64, f64) {
    if predictions.len() == 1 {
        if let Some(&only) = predictions.values().next() {
            return (only, 0.0);
        }
    }

    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (kind, p) in predictions {
        let w = weights.weight(*kind);
        weighted += p * w;
        total_weight += w;
    }

    let probability = if total_weight > 0.0 {
        weighted / total_weight
    } else {
        fallback
    };

    let variance = if predictions.len() > 1 {
        let n = predictions.len() as f64;
        let mean = predictions.values().sum::<f64>() / n;
        predictions.values().map(|p| (p - mean).powi(2)).sum::<f64>() / n
    } else {
        0.0
    };

    (probability, variance)
}

/// Ensemble strategy holding the (calibratable) weight mapping.
///
/// Single-owner: calibration mutates the weights.
pub struct ProbabilityEnsemble {
    weights: EnsembleWeights,
    external: Option<Box<dyn ProbabilityEstimator>>,
}

impl ProbabilityEnsemble {
    pub fn new(weights: EnsembleWeights) -> Self {
        Self {
            weights,
            external: None,
        }
    }

    pub fn with_external(mut self, estimator: impl ProbabilityEstimator + 'static) -> Self {
        self.external = Some(Box::new(estimator));
        self
    }

    pub fn weights(&self) -> &EnsembleWeights {
        &self.weights
    }

    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }

    /// Replace weights with accuracy scores normalized by their total.
    ///
    /// Returns false (weights untouched) when no score is positive.
    pub fn calibrate_weights(&mut self, performance: &HashMap<ModelKind, f64>) -> bool {
        match EnsembleWeights::from_performance(performance) {
            Some(weights) => {
                debug!(?weights, "ensemble weights recalibrated");
                self.weights = weights;
                true
            }
            None => false,
        }
    }

    /// Ask the external estimator, rejecting values outside (0,1)
    fn external_estimate(&self, question: &str, description: &str) -> Option<f64> {
        let estimator = self.external.as_ref()?;
        let value = estimator.estimate(question, description)?;
        if is_valid_probability(value) {
            Some(value)
        } else {
            warn!(value, "discarding external estimate outside (0, 1)");
            None
        }
    }

    /// Fuse all available estimates for a market.
    ///
    /// Every heuristic is always computed so calibration can keep scoring
    /// models whose weight dropped to zero; weights only shape the mean.
    pub fn analyze(
        &self,
        question: &str,
        description: Option<&str>,
        market: &MarketSnapshot,
    ) -> EnsembleResult {
        let mut predictions = BTreeMap::new();

        if let Some(p) = self.external_estimate(question, description.unwrap_or("")) {
            predictions.insert(ModelKind::External, p);
        }
        predictions.insert(ModelKind::BaseRate, base_rate_estimate(question));
        if let Some(p) = market_momentum_estimate(market.probability, market.volume) {
            predictions.insert(ModelKind::Momentum, p);
        }
        if let Some(p) = contrarian_estimate(market.probability) {
            predictions.insert(ModelKind::Contrarian, p);
        }

        let (probability, variance) = fuse(&predictions, &self.weights, market.probability);
        let result = EnsembleResult {
            probability,
            confidence: 1.0 / (1.0 + 10.0 * variance),
            variance,
            agreement: 1.0 - variance,
            predictions,
        };

        debug!(
            market = %market.id,
            probability = result.probability,
            confidence = result.confidence,
            models = result.predictions.len(),
            "ensemble prediction"
        );

        result
    }

    /// Analyze using the snapshot's own question and description
    pub fn predict(&self, market: &MarketSnapshot) -> EnsembleResult {
        self.analyze(&market.question, market.description.as_deref(), market)
    }
}

impl Default for ProbabilityEnsemble {
    fn default() -> Self {
        Self::new(EnsembleWeights::default())
    }
}

impl fmt::Debug for ProbabilityEnsemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbabilityEnsemble")
            .field("weights", &self.weights)
            .field("external", &self.external.is_some())
            .finish()
    }
}

impl MarketEstimator for ProbabilityEnsemble {
    fn estimate_market(&self, market: &MarketSnapshot) -> Option<f64> {
        let p = self.predict(market).probability;
        is_valid_probability(p).then_some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Outcome;

    fn market(p: f64, volume: f64) -> MarketSnapshot {
        MarketSnapshot::new("m1", "Who wins the cup?", p).with_volume(volume)
    }

    #[test]
    fn test_heuristics_only() {
        let ensemble = ProbabilityEnsemble::default();
        let result = ensemble.predict(&market(0.5, 50.0));
        // base 0.5, momentum 0.5, contrarian 0.5
        assert_eq!(result.predictions.len(), 3);
        assert!((result.probability - 0.5).abs() < 1e-12);
        assert_eq!(result.variance, 0.0);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_external_included_and_weighted() {
        let mut mock = MockProbabilityEstimator::new();
        mock.expect_estimate()
            .times(1)
            .returning(|_, _| Some(0.9));
        let ensemble = ProbabilityEnsemble::default().with_external(mock);

        let result = ensemble.predict(&market(0.5, 50.0));
        assert_eq!(result.predictions.get(&ModelKind::External), Some(&0.9));
        // (0.9*0.5 + 0.5*0.5) / 1.0
        assert!((result.probability - 0.7).abs() < 1e-12);
        // values 0.9, 0.5, 0.5, 0.5: mean 0.6, var 0.03
        assert!((result.variance - 0.03).abs() < 1e-12);
        assert!((result.confidence - 1.0 / 1.3).abs() < 1e-12);
        assert!((result.agreement - 0.97).abs() < 1e-12);
    }

    #[test]
    fn test_absent_external_renormalizes() {
        let mut mock = MockProbabilityEstimator::new();
        mock.expect_estimate().returning(|_, _| None);
        let ensemble = ProbabilityEnsemble::default().with_external(mock);

        let m = MarketSnapshot::new("m", "Will it grow?", 0.5).with_volume(10.0);
        let result = ensemble.predict(&m);
        assert!(!result.predictions.contains_key(&ModelKind::External));
        // (0.65*0.2 + 0.5*0.15 + 0.5*0.15) / 0.5
        assert!((result.probability - 0.56).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_external_rejected() {
        let ensemble = ProbabilityEnsemble::default()
            .with_external(FnEstimator(|_: &str, _: &str| Some(1.0)));
        let result = ensemble.predict(&market(0.5, 50.0));
        assert!(!result.predictions.contains_key(&ModelKind::External));
    }

    #[test]
    fn test_single_contributor_passthrough() {
        let mut predictions = BTreeMap::new();
        predictions.insert(ModelKind::Contrarian, 0.37);
        let (probability, variance) = fuse(&predictions, &EnsembleWeights::default(), 0.5);
        assert_eq!(probability, 0.37);
        assert_eq!(variance, 0.0);
    }

    #[test]
    fn test_zero_weight_models_still_reported() {
        let mut perf = HashMap::new();
        perf.insert(ModelKind::External, 0.8);
        let mut ensemble = ProbabilityEnsemble::default()
            .with_external(FnEstimator(|_: &str, _: &str| Some(0.37)));
        assert!(ensemble.calibrate_weights(&perf));

        let result = ensemble.predict(&market(0.9, 5000.0));
        assert_eq!(result.predictions.len(), 4);
        // only the external model carries weight
        assert!((result.probability - 0.37).abs() < 1e-12);
        // disagreement among the heuristics still lowers confidence
        assert!(result.variance > 0.0);
        assert!(result.confidence < 1.0);
    }

    #[test]
    fn test_zeroed_model_recovers_on_recalibration() {
        let mut perf = HashMap::new();
        perf.insert(ModelKind::BaseRate, 0.2);
        perf.insert(ModelKind::Momentum, 0.9);
        let mut ensemble = ProbabilityEnsemble::default();
        assert!(ensemble.calibrate_weights(&perf));
        assert_eq!(ensemble.weights().contrarian, 0.0);

        let mut tracker = PerformanceTracker::new();
        for i in 0..20 {
            let m = MarketSnapshot::new(format!("m{}", i), "Who wins the cup?", 0.95)
                .with_volume(5000.0);
            tracker.record(&ensemble.predict(&m).predictions, Outcome::No);
        }

        let accuracy = tracker.accuracy_by_model();
        // contrarian 0.725 vs momentum 0.955 against a NO outcome
        assert!((accuracy[&ModelKind::Contrarian] - 0.275).abs() < 1e-9);
        assert!(accuracy[&ModelKind::Contrarian] > accuracy[&ModelKind::Momentum]);

        assert!(ensemble.calibrate_weights(&accuracy));
        let w = ensemble.weights();
        assert!(w.contrarian > 0.0);
        assert!(w.contrarian > w.momentum);
    }

    #[test]
    fn test_calibrate_weights_normalizes() {
        let mut perf = HashMap::new();
        perf.insert(ModelKind::External, 3.0);
        perf.insert(ModelKind::BaseRate, 1.0);
        let mut ensemble = ProbabilityEnsemble::default();
        assert!(ensemble.calibrate_weights(&perf));
        let w = ensemble.weights();
        assert!((w.external - 0.75).abs() < 1e-12);
        assert!((w.base_rate - 0.25).abs() < 1e-12);
        assert_eq!(w.momentum, 0.0);
        assert_eq!(w.contrarian, 0.0);

        let mut ensemble = ProbabilityEnsemble::default();
        assert!(!ensemble.calibrate_weights(&HashMap::new()));
        assert_eq!(*ensemble.weights(), EnsembleWeights::default());
    }

    #[test]
    fn test_model_names_roundtrip() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::from_str(kind.as_str()), Some(kind));
        }
        let json = serde_json::to_string(&EnsembleWeights::default()).unwrap();
        assert!(json.contains("\"llm\":0.5"));
        assert!(json.contains("\"market_momentum\":0.15"));
    }
}
