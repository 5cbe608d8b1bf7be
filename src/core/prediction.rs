use chrono::Utc;

use super::vector::FeatureRow;
use crate::error::ClassifierError;
use crate::models::{Interval, Prediction};

/// Pre-trained classifier. Takes one row in trained column order and returns
/// one output per target, in tv, etco2, spo2, pplat order.
#[cfg_attr(test, mockall::automock)]
pub trait Classifier: Send + Sync {
    fn predict(&self, row: &FeatureRow) -> Result<Vec<f64>, ClassifierError>;
}

/// Run the classifier on `row` and map its output onto a [`Prediction`].
/// Classifier errors are returned untouched.
pub fn predict_outcomes(
    classifier: &dyn Classifier,
    patient_id: &str,
    at: Interval,
    row: &FeatureRow,
) -> Result<Prediction, ClassifierError> {
    let outputs = classifier.predict(row)?;
    interpret(patient_id, at, &outputs)
}

/// Map a four-slot classifier output to named in-range labels.
pub fn interpret(patient_id: &str, at: Interval, outputs: &[f64]) -> Result<Prediction, ClassifierError> {
    let [tv, etco2, spo2, pplat] = outputs else {
        return Err(ClassifierError::Shape(outputs.len()));
    };
    Ok(Prediction {
        patient_id: patient_id.to_string(),
        time_interval: at,
        tv_in_range_next: label(*tv),
        etco2_in_range_next: label(*etco2),
        spo2_in_range_next: label(*spo2),
        pplat_in_range_next: label(*pplat),
        predicted_at: Utc::now(),
    })
}

/// Integer coercion of one output slot.
fn label(output: f64) -> i64 {
    if output.trunc() >= 1.0 {
        1
    } else {
        0
    }
}
