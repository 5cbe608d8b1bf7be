//! Data models for the ventilation monitoring tables.
//!
//! Every time-series record is keyed by `(patient_id, time_interval)`. Field
//! names double as feature names for the classifier, so renaming a field is a
//! breaking change to the trained model.

pub mod features;
pub mod interval;
pub mod parameter;
pub mod patient;
pub mod prediction;
pub mod ventilation;

pub use features::DerivedFeature;
pub use interval::Interval;
pub use parameter::{LowerBound, Parameter, TargetBand};
pub use patient::Patient;
pub use prediction::Prediction;
pub use ventilation::{ObservedData, ObservedReadings, VentSetting};
