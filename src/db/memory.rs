//! Process-local record store backed by concurrent maps.

use async_trait::async_trait;
use dashmap::DashMap;

use super::RecordStore;
use crate::error::StoreError;
use crate::models::{DerivedFeature, Interval, ObservedData, Patient, Prediction, VentSetting};

type Key = (String, Interval);

#[derive(Default)]
pub struct MemoryStore {
    patients: DashMap<String, Patient>,
    vent_settings: DashMap<Key, VentSetting>,
    observed: DashMap<Key, ObservedData>,
    derived: DashMap<Key, DerivedFeature>,
    predictions: DashMap<Key, Prediction>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(patient_id: &str, at: Interval) -> Key {
    (patient_id.to_string(), at)
}

/// Rows for one patient in ascending interval order.
fn history<T: Clone>(table: &DashMap<Key, T>, patient_id: &str) -> Vec<T> {
    let mut rows: Vec<(Interval, T)> = table
        .iter()
        .filter(|entry| entry.key().0 == patient_id)
        .map(|entry| (entry.key().1, entry.value().clone()))
        .collect();
    rows.sort_by_key(|(at, _)| *at);
    rows.into_iter().map(|(_, row)| row).collect()
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StoreError> {
        self.patients.insert(patient.patient_id.clone(), patient.clone());
        Ok(())
    }

    async fn patient(&self, patient_id: &str) -> Result<Option<Patient>, StoreError> {
        Ok(self.patients.get(patient_id).map(|p| p.value().clone()))
    }

    async fn patient_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.patients.iter().map(|p| p.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }

    async fn upsert_vent_setting(&self, setting: &VentSetting) -> Result<(), StoreError> {
        self.vent_settings
            .insert(key(&setting.patient_id, setting.time_interval), setting.clone());
        Ok(())
    }

    async fn vent_setting(&self, patient_id: &str, at: Interval) -> Result<Option<VentSetting>, StoreError> {
        Ok(self.vent_settings.get(&key(patient_id, at)).map(|s| s.value().clone()))
    }

    async fn latest_vent_setting(&self, patient_id: &str, at: Interval) -> Result<Option<VentSetting>, StoreError> {
        Ok(history(&self.vent_settings, patient_id)
            .into_iter()
            .filter(|s| s.time_interval <= at)
            .last())
    }

    async fn vent_settings(&self, patient_id: &str) -> Result<Vec<VentSetting>, StoreError> {
        Ok(history(&self.vent_settings, patient_id))
    }

    async fn upsert_observed(&self, observed: &ObservedData) -> Result<(), StoreError> {
        self.observed
            .insert(key(&observed.patient_id, observed.time_interval), observed.clone());
        Ok(())
    }

    async fn observed(&self, patient_id: &str, at: Interval) -> Result<Option<ObservedData>, StoreError> {
        Ok(self.observed.get(&key(patient_id, at)).map(|o| o.value().clone()))
    }

    async fn observed_history(&self, patient_id: &str) -> Result<Vec<ObservedData>, StoreError> {
        Ok(history(&self.observed, patient_id))
    }

    async fn upsert_derived(&self, derived: &DerivedFeature) -> Result<(), StoreError> {
        self.derived
            .insert(key(&derived.patient_id, derived.time_interval), derived.clone());
        Ok(())
    }

    async fn derived(&self, patient_id: &str, at: Interval) -> Result<Option<DerivedFeature>, StoreError> {
        Ok(self.derived.get(&key(patient_id, at)).map(|d| d.value().clone()))
    }

    async fn upsert_prediction(&self, prediction: &Prediction) -> Result<(), StoreError> {
        self.predictions
            .insert(key(&prediction.patient_id, prediction.time_interval), prediction.clone());
        Ok(())
    }

    async fn prediction(&self, patient_id: &str, at: Interval) -> Result<Option<Prediction>, StoreError> {
        Ok(self.predictions.get(&key(patient_id, at)).map(|p| p.value().clone()))
    }

    async fn predictions(&self, patient_id: &str) -> Result<Vec<Prediction>, StoreError> {
        Ok(history(&self.predictions, patient_id))
    }
}
