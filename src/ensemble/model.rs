//! Consumed model interface: classifiers, feature vectors and artifacts.
//!
//! A model declares the ordered feature names it was trained on. Rows are
//! built by name from a [`FeatureVector`]; a missing or non-finite feature
//! makes the model unusable for that event. Nothing is zero-filled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

use super::dense::DenseNetwork;
use super::logistic::LogisticModel;
use crate::error::{EdgeError, Result};

/// Named feature values for one event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row in `names` order, or the reason it cannot be built
    pub fn select(&self, names: &[String]) -> std::result::Result<Vec<f64>, String> {
        let mut missing = Vec::new();
        let mut row = Vec::with_capacity(names.len());
        for name in names {
            match self.values.get(name) {
                Some(v) if v.is_finite() => row.push(*v),
                Some(v) => return Err(format!("feature {name} is not finite ({v})")),
                None => missing.push(name.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(format!("missing features: {}", missing.join(", ")));
        }
        Ok(row)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A trained binary classifier
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Ordered feature names the model expects
    fn feature_names(&self) -> &[String];

    /// P(class = 1) for a row laid out in `feature_names` order
    fn predict_proba(&self, row: &[f64]) -> Result<f64>;

    fn predict_class(&self, probability: f64) -> u8 {
        u8::from(probability > 0.5)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Logistic(LogisticModel),
    Dense(DenseNetwork),
}

/// A model as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    /// What the model predicts, e.g. "home_team_winning"
    pub target: String,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub model: ModelSpec,
}

impl ModelArtifact {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EdgeError::Validation("model name is empty".to_string()));
        }
        if self.feature_names.is_empty() {
            return Err(EdgeError::Validation(format!(
                "model {} declares no features",
                self.name
            )));
        }
        let shape = match &self.model {
            ModelSpec::Logistic(m) => m.validate(self.feature_names.len()),
            ModelSpec::Dense(net) => net.validate().and_then(|_| {
                if net.input_dim == self.feature_names.len() {
                    Ok(())
                } else {
                    Err(format!(
                        "input_dim {} for {} features",
                        net.input_dim,
                        self.feature_names.len()
                    ))
                }
            }),
        };
        shape.map_err(|reason| EdgeError::ModelUnusable {
            model: self.name.clone(),
            reason,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let artifact: Self = serde_json::from_str(&content)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl Classifier for ModelArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        match &self.model {
            ModelSpec::Logistic(m) => m.predict_proba(row),
            ModelSpec::Dense(net) => net.predict_proba(row),
        }
    }
}

/// Load every `*.json` artifact in `dir` for `target`, keeping the most
/// recently trained artifact per model name. Sorted by name.
///
/// A missing directory yields no models. Unreadable artifacts are skipped.
pub fn load_models<P: AsRef<Path>>(dir: P, target: &str) -> Result<Vec<ModelArtifact>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "Models directory not found");
        return Ok(Vec::new());
    }

    let mut latest: HashMap<String, ModelArtifact> = HashMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let artifact = match ModelArtifact::from_file(&path) {
            Ok(a) => a,
            Err(e) => {
                warn!(path = %path.display(), "Skipping model artifact: {}", e);
                continue;
            }
        };
        if artifact.target != target {
            debug!(model = %artifact.name, target = %artifact.target, "Different target, skipped");
            continue;
        }
        match latest.get(&artifact.name) {
            Some(existing) if existing.trained_at >= artifact.trained_at => {}
            _ => {
                latest.insert(artifact.name.clone(), artifact);
            }
        }
    }

    let mut models: Vec<ModelArtifact> = latest.into_values().collect();
    models.sort_by(|a, b| a.name.cmp(&b.name));
    for m in &models {
        info!(model = %m.name, trained_at = %m.trained_at, "Loaded model");
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn logistic(name: &str, target: &str, day: u32, intercept: f64) -> ModelArtifact {
        ModelArtifact {
            name: name.to_string(),
            target: target.to_string(),
            trained_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            feature_names: vec!["elo_diff".to_string(), "rest_days".to_string()],
            model: ModelSpec::Logistic(LogisticModel {
                intercept,
                coefficients: vec![0.01, 0.1],
            }),
        }
    }

    #[test]
    fn test_select_in_model_order() {
        let fv = FeatureVector::new().with("rest_days", 2.0).with("elo_diff", 50.0);
        let row = fv
            .select(&["elo_diff".to_string(), "rest_days".to_string()])
            .unwrap();
        assert_eq!(row, vec![50.0, 2.0]);
    }

    #[test]
    fn test_select_never_zero_fills() {
        let fv = FeatureVector::new().with("elo_diff", 50.0).with("pace", f64::NAN);
        let err = fv
            .select(&["elo_diff".to_string(), "rest_days".to_string()])
            .unwrap_err();
        assert!(err.contains("rest_days"), "got {err}");
        assert!(fv.select(&["pace".to_string()]).is_err());
    }

    #[test]
    fn test_artifact_json_shape() {
        let json = r#"{
            "name": "logreg",
            "target": "home_team_winning",
            "trained_at": "2024-01-05T00:00:00Z",
            "feature_names": ["elo_diff"],
            "model": {"kind": "logistic", "intercept": 0.0, "coefficients": [0.02]}
        }"#;
        let artifact: ModelArtifact = serde_json::from_str(json).unwrap();
        artifact.validate().unwrap();
        assert!(artifact.predict_proba(&[100.0]).unwrap() > 0.5);
        assert_eq!(artifact.predict_class(0.5), 0);
        assert_eq!(artifact.predict_class(0.51), 1);
    }

    #[test]
    fn test_validate_catches_width_mismatch() {
        let mut a = logistic("logreg", "home_team_winning", 1, 0.0);
        a.feature_names.pop();
        assert!(matches!(a.validate(), Err(EdgeError::ModelUnusable { .. })));
    }

    #[test]
    fn test_load_models_keeps_latest_per_name() {
        let dir = tempfile::tempdir().unwrap();
        logistic("logreg", "home_team_winning", 1, -1.0)
            .to_file(dir.path().join("logreg_old.json"))
            .unwrap();
        logistic("logreg", "home_team_winning", 9, 1.0)
            .to_file(dir.path().join("logreg_new.json"))
            .unwrap();
        logistic("forest", "over_under", 3, 0.0)
            .to_file(dir.path().join("forest.json"))
            .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let models = load_models(dir.path(), "home_team_winning").unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].trained_at.format("%d").to_string(), "09");
    }

    #[test]
    fn test_load_models_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let models = load_models(dir.path().join("nope"), "home_team_winning").unwrap();
        assert!(models.is_empty());
    }
}
