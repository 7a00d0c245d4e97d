//! Prediction quality scoring and accuracy tracking
//!
//! Scores each model against resolved outcomes and accumulates the
//! accuracy mapping used by [`super::ProbabilityEnsemble::calibrate_weights`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::ModelKind;
use crate::types::Outcome;

/// Quality of one model's prediction against a resolved outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionScore {
    /// |prediction - outcome|
    pub error: f64,
    /// (prediction - outcome)^2
    pub brier_score: f64,
    /// 1 - error
    pub accuracy: f64,
}

impl PredictionScore {
    pub fn new(prediction: f64, outcome: Outcome) -> Self {
        let actual = match outcome {
            Outcome::Yes => 1.0,
            Outcome::No => 0.0,
        };
        let error = (prediction - actual).abs();
        Self {
            error,
            brier_score: (prediction - actual).powi(2),
            accuracy: 1.0 - error,
        }
    }
}

/// Score every model's prediction against the realized outcome
pub fn score_predictions(
    predictions: &BTreeMap<ModelKind, f64>,
    outcome: Outcome,
) -> BTreeMap<ModelKind, PredictionScore> {
    predictions
        .iter()
        .map(|(kind, p)| (*kind, PredictionScore::new(*p, outcome)))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct ModelTally {
    accuracy_sum: f64,
    brier_sum: f64,
    n: usize,
}

/// Running accuracy per model across resolved markets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceTracker {
    tallies: BTreeMap<ModelKind, ModelTally>,
    observations: usize,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one resolved market's model predictions
    pub fn record(&mut self, predictions: &BTreeMap<ModelKind, f64>, outcome: Outcome) {
        for (kind, score) in score_predictions(predictions, outcome) {
            let tally = self.tallies.entry(kind).or_default();
            tally.accuracy_sum += score.accuracy;
            tally.brier_sum += score.brier_score;
            tally.n += 1;
        }
        self.observations += 1;
    }

    /// Mean accuracy per model, ready for weight calibration
    pub fn accuracy_by_model(&self) -> HashMap<ModelKind, f64> {
        self.tallies
            .iter()
            .filter(|(_, t)| t.n > 0)
            .map(|(k, t)| (*k, t.accuracy_sum / t.n as f64))
            .collect()
    }

    /// Mean Brier score per model (lower is better)
    pub fn brier_by_model(&self) -> HashMap<ModelKind, f64> {
        self.tallies
            .iter()
            .filter(|(_, t)| t.n > 0)
            .map(|(k, t)| (*k, t.brier_sum / t.n as f64))
            .collect()
    }

    pub fn n_observations(&self) -> usize {
        self.observations
    }

    pub fn clear(&mut self) {
        self.tallies.clear();
        self.observations = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_score() {
        let s = PredictionScore::new(0.8, Outcome::Yes);
        assert!((s.error - 0.2).abs() < 1e-12);
        assert!((s.brier_score - 0.04).abs() < 1e-12);
        assert!((s.accuracy - 0.8).abs() < 1e-12);

        let s = PredictionScore::new(0.8, Outcome::No);
        assert!((s.accuracy - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_tracker_accumulates_mean_accuracy() {
        let mut tracker = PerformanceTracker::new();
        let mut preds = BTreeMap::new();
        preds.insert(ModelKind::BaseRate, 0.6);
        preds.insert(ModelKind::Contrarian, 0.2);
        tracker.record(&preds, Outcome::Yes);
        tracker.record(&preds, Outcome::No);

        let acc = tracker.accuracy_by_model();
        // base rate: (0.6 + 0.4) / 2, contrarian: (0.2 + 0.8) / 2
        assert!((acc[&ModelKind::BaseRate] - 0.5).abs() < 1e-12);
        assert!((acc[&ModelKind::Contrarian] - 0.5).abs() < 1e-12);
        assert_eq!(tracker.n_observations(), 2);
        assert!(!acc.contains_key(&ModelKind::External));
    }
}
