#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use ventwatch::core::{FeatureSchema, LinearClassifier};
use ventwatch::db::{RecordStore, SqliteStore};
use ventwatch::models::{ObservedReadings, Patient};
use ventwatch::service::IntervalSubmission;
use ventwatch::VentilationService;

fn asset(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("model").join(name)
}

/// Service over a fresh in-memory SQLite database and the bundled model.
pub async fn service() -> VentilationService {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let schema = FeatureSchema::load(asset("feature_names.json")).unwrap();
    let classifier = LinearClassifier::load(asset("ventilation_model.json")).unwrap();
    VentilationService::new(store, schema, Arc::new(classifier))
}

pub fn patient_json(patient_id: &str) -> serde_json::Value {
    json!({
        "patient_id": patient_id,
        "gender": "Female",
        "age": 61,
        "height": 160.0,
        "weight": 64.0,
        "comorbid_hpt": true,
        "indication_intubation": "FAILURE OF VENTILATION",
        "gcs": 9,
        "fio2_prior": 0.5,
        "ett_size": 7.0,
        "stratified_lung_pathology": "OBSTRUCTIVE LUNG",
        "min_tv": 400.0,
        "max_tv": 600.0,
        "min_etco2": 35.0,
        "max_etco2": 45.0,
        "min_spo2": 92.0,
        "max_spo2": 100.0,
        "max_pplat": 30.0
    })
}

pub fn patient(patient_id: &str) -> Patient {
    serde_json::from_value(patient_json(patient_id)).unwrap()
}

pub fn readings(tv: f64) -> ObservedReadings {
    serde_json::from_value(json!({
        "tv": tv,
        "etco2": 40.0,
        "spo2": 96.0,
        "pplat": 20.0,
        "ppeak": 22.0,
        "hr": 88.0,
        "rr": 14.0
    }))
    .unwrap()
}

pub fn submission_json(time_interval: i64, tv: f64) -> serde_json::Value {
    json!({
        "time_interval": time_interval,
        "tv_setting": 400.0,
        "fio2": 0.4,
        "ventilator_rate": 14.0,
        "ie_ratio": "1:2",
        "peep": 5.0,
        "ps": 10.0,
        "observed": {
            "tv": tv,
            "etco2": 40.0,
            "spo2": 96.0,
            "pplat": 20.0,
            "ppeak": 22.0,
            "hr": 88.0,
            "rr": 14.0
        }
    })
}

pub fn submission(time_interval: i64, tv: f64) -> IntervalSubmission {
    IntervalSubmission {
        time_interval,
        tv_setting: 400.0,
        fio2: 0.4,
        ventilator_rate: 14.0,
        ie_ratio: "1:2".to_string(),
        peep: 5.0,
        ps: 10.0,
        observed: Some(readings(tv)),
    }
}
