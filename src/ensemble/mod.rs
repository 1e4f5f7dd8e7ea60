//! Ensemble of trained classifiers.
//!
//! Each model either predicts or is marked unusable for an event. Usable
//! predictions are combined into a mean probability and a majority-vote
//! class; unusable ones are left out of both. An event with no usable model
//! is dropped rather than given a default probability.

pub mod dense;
pub mod logistic;
pub mod model;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::EventRef;
use crate::telemetry::{SharedTelemetry, Signal, TracingTelemetry};

pub use dense::{sigmoid, Activation, DenseLayer, DenseNetwork};
pub use logistic::LogisticModel;
pub use model::{load_models, Classifier, FeatureVector, ModelArtifact, ModelSpec};

/// Outcome of one model for one event
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResult {
    Predicted {
        model: String,
        probability: f64,
        class: u8,
    },
    Unusable {
        model: String,
        reason: String,
    },
}

impl ModelResult {
    pub fn model(&self) -> &str {
        match self {
            ModelResult::Predicted { model, .. } | ModelResult::Unusable { model, .. } => model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub event_ref: EventRef,
    pub per_model_probability: BTreeMap<String, f64>,
    /// Mean P(class = 1) over usable models
    pub ensemble_probability: f64,
    /// Majority vote over usable models' classes
    pub ensemble_class: u8,
}

/// Majority class of `(class, probability)` votes.
///
/// On a tie the class whose voters are more confident in it wins, where a
/// vote for 1 counts `p` and a vote for 0 counts `1 - p`. Still tied: 0.
pub fn majority_class(votes: &[(u8, f64)]) -> Option<u8> {
    if votes.is_empty() {
        return None;
    }
    let (ones, zeros): (Vec<_>, Vec<_>) = votes.iter().partition(|(c, _)| *c == 1);
    if ones.len() != zeros.len() {
        return Some(u8::from(ones.len() > zeros.len()));
    }

    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let one_conf = mean(&ones.iter().map(|(_, p)| *p).collect::<Vec<_>>());
    let zero_conf = mean(&zeros.iter().map(|(_, p)| 1.0 - p).collect::<Vec<_>>());
    Some(u8::from(one_conf > zero_conf))
}

pub struct EnsembleAggregator {
    telemetry: SharedTelemetry,
}

impl Default for EnsembleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsembleAggregator {
    pub fn new() -> Self {
        Self {
            telemetry: TracingTelemetry::shared(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Combine per-model results for one event; `None` if none is usable
    pub fn aggregate(&self, event_ref: &EventRef, results: &[ModelResult]) -> Option<Prediction> {
        let mut per_model = BTreeMap::new();
        let mut votes = Vec::with_capacity(results.len());

        for result in results {
            match result {
                ModelResult::Predicted {
                    model,
                    probability,
                    class,
                } if probability.is_finite() && (0.0..=1.0).contains(probability) && *class <= 1 => {
                    per_model.insert(model.clone(), *probability);
                    votes.push((*class, *probability));
                }
                ModelResult::Predicted {
                    model, probability, ..
                } => self.unusable(event_ref, model, &format!("invalid output {probability}")),
                ModelResult::Unusable { model, reason } => self.unusable(event_ref, model, reason),
            }
        }

        let Some(ensemble_class) = majority_class(&votes) else {
            self.telemetry.emit(Signal::PredictionDropped {
                event_ref: event_ref.clone(),
            });
            return None;
        };
        let ensemble_probability = votes.iter().map(|(_, p)| p).sum::<f64>() / votes.len() as f64;

        Some(Prediction {
            event_ref: event_ref.clone(),
            per_model_probability: per_model,
            ensemble_probability,
            ensemble_class,
        })
    }

    /// Run every model on one event's features, then aggregate
    pub fn predict_event<C: Classifier>(
        &self,
        event_ref: &EventRef,
        features: &FeatureVector,
        models: &[C],
    ) -> Option<Prediction> {
        let results: Vec<ModelResult> = models.iter().map(|m| run_model(m, features)).collect();
        self.aggregate(event_ref, &results)
    }

    /// Predict every event that has features; events without any are dropped
    pub fn predict_all<C: Classifier>(
        &self,
        features: &BTreeMap<EventRef, FeatureVector>,
        models: &[C],
    ) -> Vec<Prediction> {
        features
            .iter()
            .filter_map(|(event_ref, fv)| self.predict_event(event_ref, fv, models))
            .collect()
    }

    fn unusable(&self, event_ref: &EventRef, model: &str, reason: &str) {
        self.telemetry.emit(Signal::ModelUnusable {
            event_ref: event_ref.clone(),
            model: model.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Evaluate one model, turning any failure into `Unusable`
pub fn run_model<C: Classifier + ?Sized>(model: &C, features: &FeatureVector) -> ModelResult {
    let unusable = |reason: String| ModelResult::Unusable {
        model: model.name().to_string(),
        reason,
    };
    let row = match features.select(model.feature_names()) {
        Ok(row) => row,
        Err(reason) => return unusable(reason),
    };
    match model.predict_proba(&row) {
        Ok(p) => ModelResult::Predicted {
            model: model.name().to_string(),
            probability: p,
            class: model.predict_class(p),
        },
        Err(e) => unusable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::RecordingTelemetry;

    fn predicted(model: &str, probability: f64, class: u8) -> ModelResult {
        ModelResult::Predicted {
            model: model.to_string(),
            probability,
            class,
        }
    }

    fn event_ref() -> EventRef {
        EventRef::new("espn", "401")
    }

    #[test]
    fn test_three_model_majority_and_mean() {
        let agg = EnsembleAggregator::new().with_telemetry(RecordingTelemetry::new());
        let results = vec![
            predicted("logreg", 0.8, 1),
            predicted("forest", 0.6, 1),
            predicted("boost", 0.55, 0),
        ];
        let p = agg.aggregate(&event_ref(), &results).unwrap();
        assert_eq!(p.ensemble_class, 1);
        assert!((p.ensemble_probability - 0.65).abs() < 1e-12);
        assert_eq!(p.per_model_probability.len(), 3);
    }

    #[test]
    fn test_single_model_is_identity() {
        let agg = EnsembleAggregator::new();
        for (prob, class) in [(0.73, 1), (0.21, 0), (0.5, 0)] {
            let p = agg
                .aggregate(&event_ref(), &[predicted("only", prob, class)])
                .unwrap();
            assert_eq!(p.ensemble_probability, prob);
            assert_eq!(p.ensemble_class, class);
        }
    }

    #[test]
    fn test_unusable_models_excluded_from_vote_and_mean() {
        let rec = RecordingTelemetry::new();
        let agg = EnsembleAggregator::new().with_telemetry(rec.clone());
        let results = vec![
            predicted("logreg", 0.3, 0),
            ModelResult::Unusable {
                model: "forest".to_string(),
                reason: "missing features: pace".to_string(),
            },
            predicted("boost", f64::NAN, 1),
        ];
        let p = agg.aggregate(&event_ref(), &results).unwrap();
        assert_eq!(p.ensemble_probability, 0.3);
        assert_eq!(p.ensemble_class, 0);
        let unusable = rec
            .signals()
            .iter()
            .filter(|s| matches!(s, Signal::ModelUnusable { .. }))
            .count();
        assert_eq!(unusable, 2);
    }

    #[test]
    fn test_no_usable_model_drops_event() {
        let rec = RecordingTelemetry::new();
        let agg = EnsembleAggregator::new().with_telemetry(rec.clone());
        let results = vec![ModelResult::Unusable {
            model: "forest".to_string(),
            reason: "missing".to_string(),
        }];
        assert!(agg.aggregate(&event_ref(), &results).is_none());
        assert!(agg.aggregate(&event_ref(), &[]).is_none());
        assert!(rec
            .signals()
            .iter()
            .any(|s| matches!(s, Signal::PredictionDropped { .. })));
    }

    #[test]
    fn test_tie_goes_to_more_confident_class() {
        // class 1 voter at 0.9 vs class 0 voter at 0.4 (0.6 confident in 0)
        assert_eq!(majority_class(&[(1, 0.9), (0, 0.4)]), Some(1));
        // class 1 voter at 0.55 vs class 0 voter at 0.1 (0.9 confident in 0)
        assert_eq!(majority_class(&[(1, 0.55), (0, 0.1)]), Some(0));
        // equal confidence falls back to 0
        assert_eq!(majority_class(&[(1, 0.75), (0, 0.25)]), Some(0));
        assert_eq!(majority_class(&[]), None);
    }

    #[test]
    fn test_predict_event_marks_missing_features_unusable() {
        let with_pace = ModelArtifact {
            name: "pace_model".to_string(),
            target: "home_team_winning".to_string(),
            trained_at: chrono::Utc::now(),
            feature_names: vec!["pace".to_string()],
            model: ModelSpec::Logistic(LogisticModel {
                intercept: 0.0,
                coefficients: vec![1.0],
            }),
        };
        let elo = ModelArtifact {
            name: "elo_model".to_string(),
            feature_names: vec!["elo_diff".to_string()],
            model: ModelSpec::Logistic(LogisticModel {
                intercept: 0.0,
                coefficients: vec![0.01],
            }),
            ..with_pace.clone()
        };
        let fv = FeatureVector::new().with("elo_diff", 100.0);

        let agg = EnsembleAggregator::new().with_telemetry(RecordingTelemetry::new());
        let p = agg
            .predict_event(&event_ref(), &fv, &[with_pace, elo])
            .unwrap();
        assert_eq!(p.per_model_probability.keys().collect::<Vec<_>>(), vec!["elo_model"]);
        assert!((p.ensemble_probability - sigmoid(1.0)).abs() < 1e-12);
        assert_eq!(p.ensemble_class, 1);
    }
}
