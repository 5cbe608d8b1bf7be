//! Feature derivation and prediction pipeline.
//!
//! Run per interval, in order: [`features`] derives trend and target
//! features, [`vector`] assembles the classifier's input row, and
//! [`prediction`] turns the classifier's output into range verdicts.

pub mod classifier;
pub mod data;
pub mod features;
pub mod prediction;
pub mod vector;

pub use classifier::LinearClassifier;
pub use features::{compute_features, derive_features, parse_ie_ratio};
pub use prediction::{interpret, predict_outcomes, Classifier};
pub use vector::{assemble_features, merge_records, FeatureRow, FeatureSchema};
