//! Error types for the prediction pipeline.
//!
//! Missing prerequisites fail fast as [`LookupError`]. Arithmetic edge cases
//! never reach this module; they become null features instead.

use thiserror::Error;

use crate::models::Interval;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("time interval {0} must be a multiple of 15 between 0 and 240")]
pub struct InvalidInterval(pub i64);

/// Record store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A record the pipeline depends on is absent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("No patient found for {0}")]
    Patient(String),

    #[error("No vent settings for {patient_id} at time {time_interval}")]
    VentSettings { patient_id: String, time_interval: Interval },

    #[error("No observed data for {patient_id} at time {time_interval}")]
    ObservedData { patient_id: String, time_interval: Interval },

    #[error("No derived features for {patient_id} at time {time_interval}")]
    DerivedFeatures { patient_id: String, time_interval: Interval },
}

/// The classifier rejected its input or produced unusable output.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("feature row does not match the trained columns: {0}")]
    FeatureMismatch(String),

    #[error("classifier returned {0} outputs, expected 4")]
    Shape(usize),

    #[error("classifier failure: {0}")]
    Other(String),
}

/// Loading the model or trained feature list failed.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model: {0}")]
    Invalid(String),
}

/// Failure while deriving, assembling or predicting.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Rejection of an interval submission, reported to the clinician.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("Ventilation data for patient {patient_id} at time {time_interval} already exists!")]
    Duplicate { patient_id: String, time_interval: Interval },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<validator::ValidationErrors> for SubmissionError {
    fn from(errors: validator::ValidationErrors) -> Self {
        SubmissionError::Validation(errors.to_string())
    }
}

impl From<InvalidInterval> for SubmissionError {
    fn from(err: InvalidInterval) -> Self {
        SubmissionError::Validation(err.to_string())
    }
}

impl From<LookupError> for SubmissionError {
    fn from(err: LookupError) -> Self {
        SubmissionError::Pipeline(err.into())
    }
}

impl From<StoreError> for SubmissionError {
    fn from(err: StoreError) -> Self {
        SubmissionError::Pipeline(err.into())
    }
}
