//! Logistic classifier read from a JSON model file.
//!
//! One logistic model per target, sharing the trained feature list. A target
//! is predicted in range (`1.0`) when its probability reaches the threshold.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::prediction::Classifier;
use super::vector::FeatureRow;
use crate::error::{ClassifierError, ModelLoadError};

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetModel {
    pub name: String,
    pub intercept: f64,
    /// Numeric and boolean features are keyed by name; categorical values
    /// by `name=value`.
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearClassifier {
    feature_names: Vec<String>,
    targets: Vec<TargetModel>,
    #[serde(default = "default_threshold")]
    threshold: f64,
    /// Fill values for null numeric features; a null with no fill
    /// contributes nothing.
    #[serde(default)]
    impute: HashMap<String, f64>,
}

impl LinearClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model: LinearClassifier = serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        model.check()?;
        debug!(path = %path.display(), features = model.feature_names.len(), "classifier loaded");
        Ok(model)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelLoadError> {
        let model: LinearClassifier = serde_json::from_str(raw).map_err(|source| ModelLoadError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        model.check()?;
        Ok(model)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn check(&self) -> Result<(), ModelLoadError> {
        if self.targets.len() != 4 {
            return Err(ModelLoadError::Invalid(format!(
                "expected 4 targets, found {}",
                self.targets.len()
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ModelLoadError::Invalid(format!("threshold {} outside 0..=1", self.threshold)));
        }
        Ok(())
    }

    fn contribution(&self, target: &TargetModel, name: &str, value: &Value) -> f64 {
        let weight = |key: &str| target.weights.get(key).copied().unwrap_or(0.0);
        match value {
            Value::Number(n) => weight(name) * n.as_f64().unwrap_or(0.0),
            Value::Bool(b) => weight(name) * f64::from(u8::from(*b)),
            Value::String(s) => weight(&format!("{}={}", name, s)),
            Value::Null => self.impute.get(name).map_or(0.0, |fill| weight(name) * fill),
            Value::Array(_) | Value::Object(_) => 0.0,
        }
    }
}

impl Classifier for LinearClassifier {
    fn predict(&self, row: &FeatureRow) -> Result<Vec<f64>, ClassifierError> {
        if row.columns() != self.feature_names.as_slice() {
            let position = row
                .columns()
                .iter()
                .zip(&self.feature_names)
                .position(|(got, want)| got != want)
                .unwrap_or_else(|| row.columns().len().min(self.feature_names.len()));
            return Err(ClassifierError::FeatureMismatch(format!(
                "row has {} columns, model expects {}; first difference at position {}",
                row.columns().len(),
                self.feature_names.len(),
                position
            )));
        }

        let outputs = self
            .targets
            .iter()
            .map(|target| {
                let z = target.intercept
                    + row
                        .iter()
                        .map(|(name, value)| self.contribution(target, name, value))
                        .sum::<f64>();
                let probability = 1.0 / (1.0 + (-z).exp());
                if probability >= self.threshold {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        Ok(outputs)
    }
}
