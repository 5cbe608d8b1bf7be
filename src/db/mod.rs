//! Record store for the ventilation tables.
//!
//! Four time-series tables (settings, observed data, derived features,
//! predictions) keyed by `(patient_id, time_interval)`, plus the patient
//! profile keyed by `patient_id`. Every write is an upsert; rejecting
//! duplicate entries is the submission layer's job.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{DerivedFeature, Interval, ObservedData, Patient, Prediction, VentSetting};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    // ===== Patients =====

    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StoreError>;

    async fn patient(&self, patient_id: &str) -> Result<Option<Patient>, StoreError>;

    async fn patient_ids(&self) -> Result<Vec<String>, StoreError>;

    // ===== Ventilator settings =====

    async fn upsert_vent_setting(&self, setting: &VentSetting) -> Result<(), StoreError>;

    async fn vent_setting(&self, patient_id: &str, at: Interval) -> Result<Option<VentSetting>, StoreError>;

    /// Most recent setting charted at or before `at`.
    async fn latest_vent_setting(&self, patient_id: &str, at: Interval) -> Result<Option<VentSetting>, StoreError>;

    async fn vent_settings(&self, patient_id: &str) -> Result<Vec<VentSetting>, StoreError>;

    // ===== Observed data =====

    async fn upsert_observed(&self, observed: &ObservedData) -> Result<(), StoreError>;

    async fn observed(&self, patient_id: &str, at: Interval) -> Result<Option<ObservedData>, StoreError>;

    async fn observed_history(&self, patient_id: &str) -> Result<Vec<ObservedData>, StoreError>;

    // ===== Derived features =====

    async fn upsert_derived(&self, derived: &DerivedFeature) -> Result<(), StoreError>;

    async fn derived(&self, patient_id: &str, at: Interval) -> Result<Option<DerivedFeature>, StoreError>;

    // ===== Predictions =====

    async fn upsert_prediction(&self, prediction: &Prediction) -> Result<(), StoreError>;

    async fn prediction(&self, patient_id: &str, at: Interval) -> Result<Option<Prediction>, StoreError>;

    async fn predictions(&self, patient_id: &str) -> Result<Vec<Prediction>, StoreError>;
}
