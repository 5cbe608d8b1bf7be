use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::db::RecordStore;
use crate::error::{LookupError, ModelLoadError, PipelineError, StoreError};
use crate::models::Interval;

/// The trained feature-name list, in the column order the classifier was
/// fitted with. Loaded once and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    columns: Arc<[String]>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self, ModelLoadError> {
        if columns.is_empty() {
            return Err(ModelLoadError::Invalid("feature list is empty".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(ModelLoadError::Invalid(format!("feature '{}' listed twice", dup)));
        }
        Ok(Self { columns: columns.into() })
    }

    /// Read a JSON array of feature names.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let columns: Vec<String> = serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Restrict `merged` to the trained columns, in trained order. Columns the
    /// merge lacks become null; extra keys are dropped.
    pub fn project(&self, merged: &Map<String, Value>) -> FeatureRow {
        let values = self
            .columns
            .iter()
            .map(|name| merged.get(name).cloned().unwrap_or(Value::Null))
            .collect();
        FeatureRow { columns: Arc::clone(&self.columns), values }
    }
}

/// One classifier input row: values positionally aligned with the trained
/// columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl FeatureRow {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

impl Serialize for FeatureRow {
    // Serialized as an object whose key order is the trained column order.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Merge record layers into one mapping. On key collisions the later layer
/// wins.
pub fn merge_records<I>(layers: I) -> Map<String, Value>
where
    I: IntoIterator<Item = Map<String, Value>>,
{
    let mut merged = Map::new();
    for layer in layers {
        merged.extend(layer);
    }
    merged
}

fn layer<T: serde::Serialize>(record: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Gather patient, settings, observed and derived records for one interval
/// and project them onto `schema`.
#[instrument(skip(store, schema))]
pub async fn assemble_features(
    store: &dyn RecordStore,
    schema: &FeatureSchema,
    patient_id: &str,
    at: Interval,
) -> Result<FeatureRow, PipelineError> {
    let patient = store
        .patient(patient_id)
        .await?
        .ok_or_else(|| LookupError::Patient(patient_id.to_string()))?;
    let setting = store.vent_setting(patient_id, at).await?.ok_or_else(|| LookupError::VentSettings {
        patient_id: patient_id.to_string(),
        time_interval: at,
    })?;
    let observed = store.observed(patient_id, at).await?.ok_or_else(|| LookupError::ObservedData {
        patient_id: patient_id.to_string(),
        time_interval: at,
    })?;
    let derived = store.derived(patient_id, at).await?.ok_or_else(|| LookupError::DerivedFeatures {
        patient_id: patient_id.to_string(),
        time_interval: at,
    })?;

    let merged = merge_records([layer(&patient)?, layer(&setting)?, layer(&observed)?, layer(&derived)?]);
    Ok(schema.project(&merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::patient::fixtures::patient;
    use crate::models::{DerivedFeature, ObservedData, ObservedReadings, VentSetting};
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn schema(columns: &[&str]) -> FeatureSchema {
        FeatureSchema::new(columns.iter().map(|c| c.to_string()).collect()).unwrap()
    }

    #[test]
    fn later_layer_wins() {
        let merged = merge_records([
            object(json!({"patient_id": "P001", "age": 54})),
            object(json!({"fio2": 0.4, "peep": 5})),
            object(json!({"fio2": 0.55, "tv": 420})),
        ]);
        assert_eq!(merged["fio2"], json!(0.55));
        assert_eq!(merged["peep"], json!(5));
        assert_eq!(merged["age"], json!(54));
    }

    #[test]
    fn projection_follows_trained_order() {
        let merged = object(json!({"tv": 420, "age": 54, "ie_ratio": "1:2", "fio2": 0.4}));
        let row = schema(&["fio2", "tv", "lactate", "age"]).project(&merged);

        assert_eq!(row.columns(), ["fio2", "tv", "lactate", "age"]);
        assert_eq!(row.values(), [json!(0.4), json!(420), Value::Null, json!(54)]);
        assert_eq!(row.get("ie_ratio"), None);
    }

    #[test]
    fn row_serializes_in_column_order() {
        let merged = object(json!({"b": 2, "a": 1}));
        let row = schema(&["b", "a"]).project(&merged);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = FeatureSchema::new(vec!["tv".into(), "tv".into()]).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    async fn charted_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.upsert_patient(&patient("P001")).await.unwrap();
        store
            .upsert_vent_setting(&VentSetting {
                patient_id: "P001".into(),
                time_interval: Interval::START,
                tv_setting: 400.0,
                fio2: 0.4,
                ventilator_rate: 14.0,
                ie_ratio: "1:2".into(),
                peep: 5.0,
                ps: 10.0,
                recorded_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn missing_observed_row_is_reported() {
        let store = charted_store().await;

        let err = assemble_features(&store, &schema(&["tv"]), "P001", Interval::START)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Lookup(LookupError::ObservedData { .. })));
        assert_eq!(err.to_string(), "No observed data for P001 at time 0");
    }

    #[tokio::test]
    async fn missing_derived_row_is_reported() {
        let store = charted_store().await;
        let readings = ObservedReadings { tv: Some(420.0), ..Default::default() };
        store
            .upsert_observed(&ObservedData::new("P001", Interval::START, readings))
            .await
            .unwrap();

        let err = assemble_features(&store, &schema(&["tv"]), "P001", Interval::START)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Lookup(LookupError::DerivedFeatures { .. })));
        assert_eq!(err.to_string(), "No derived features for P001 at time 0");

        store.upsert_derived(&DerivedFeature::empty("P001", Interval::START)).await.unwrap();
        let row = assemble_features(&store, &schema(&["tv"]), "P001", Interval::START)
            .await
            .unwrap();
        assert_eq!(row.get("tv"), Some(&json!(420.0)));
    }
}
