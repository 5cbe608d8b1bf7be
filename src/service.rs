//! Patient registration, interval submission and dashboard queries.
//!
//! A submission runs one sequential pipeline: store settings, store observed
//! data, derive features, assemble the feature row, predict, store the
//! prediction. Prediction failure is reported on the outcome and leaves the
//! rows already written in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::core::data::simulate_observed;
use crate::core::{assemble_features, derive_features, predict_outcomes, Classifier, FeatureRow, FeatureSchema};
use crate::db::RecordStore;
use crate::error::{LookupError, SubmissionError};
use crate::models::{
    DerivedFeature, Interval, ObservedData, ObservedReadings, Patient, Prediction, VentSetting,
};

/// Settings form for one interval, with optional manually charted readings.
/// Without readings the monitor simulator fills them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalSubmission {
    pub time_interval: i64,
    pub tv_setting: f64,
    pub fio2: f64,
    pub ventilator_rate: f64,
    pub ie_ratio: String,
    pub peep: f64,
    pub ps: f64,
    #[serde(default)]
    pub observed: Option<ObservedReadings>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionStatus {
    Predicted {
        prediction: Prediction,
        /// Labels of parameters predicted to leave their range.
        alerts: Vec<&'static str>,
    },
    Failed {
        error: String,
    },
}

impl PredictionStatus {
    /// Message shown to the clinician after a submission.
    pub fn summary(&self) -> String {
        match self {
            PredictionStatus::Predicted { alerts, .. } if alerts.is_empty() => {
                "All parameters predicted to remain within range.".to_string()
            }
            PredictionStatus::Predicted { alerts, .. } => format!(
                "ALERT: The following parameters are predicted to go OUT OF RANGE: {}",
                alerts.join(", ")
            ),
            PredictionStatus::Failed { error } => format!("Prediction failed: {}", error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalOutcome {
    pub submission_id: Uuid,
    pub patient_id: String,
    pub time_interval: Interval,
    pub observed: ObservedData,
    pub derived: DerivedFeature,
    pub features: FeatureRow,
    pub prediction: PredictionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelinePoint {
    pub time_interval: Interval,
    pub tv: Option<f64>,
    pub etco2: Option<f64>,
    pub spo2: Option<f64>,
    pub pplat: Option<f64>,
    pub prediction: Option<Prediction>,
}

/// Observed trend and prediction history for one patient.
#[derive(Debug, Clone, Serialize)]
pub struct PatientTimeline {
    pub patient_id: String,
    pub points: Vec<TimelinePoint>,
    /// Intervals whose prediction flagged at least one parameter.
    pub out_of_range_times: Vec<Interval>,
}

pub struct VentilationService {
    store: Arc<dyn RecordStore>,
    schema: FeatureSchema,
    classifier: Arc<dyn Classifier>,
}

impl VentilationService {
    pub fn new(store: Arc<dyn RecordStore>, schema: FeatureSchema, classifier: Arc<dyn Classifier>) -> Self {
        Self { store, schema, classifier }
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    // ===== Patients =====

    /// Validate and upsert a patient profile. Re-entry replaces targets.
    #[instrument(skip(self, patient), fields(patient_id = %patient.patient_id))]
    pub async fn register_patient(&self, patient: Patient) -> Result<(), SubmissionError> {
        patient.validate()?;
        self.store.upsert_patient(&patient).await?;
        info!("patient registered");
        Ok(())
    }

    pub async fn patients(&self) -> Result<Vec<String>, SubmissionError> {
        Ok(self.store.patient_ids().await?)
    }

    // ===== Interval submission =====

    #[instrument(skip(self, submission), fields(time = submission.time_interval))]
    pub async fn submit_interval(
        &self,
        patient_id: &str,
        submission: IntervalSubmission,
    ) -> Result<IntervalOutcome, SubmissionError> {
        let submission_id = Uuid::new_v4();
        let at = Interval::new(submission.time_interval)?;

        let setting = VentSetting {
            patient_id: patient_id.to_string(),
            time_interval: at,
            tv_setting: submission.tv_setting,
            fio2: submission.fio2,
            ventilator_rate: submission.ventilator_rate,
            ie_ratio: submission.ie_ratio,
            peep: submission.peep,
            ps: submission.ps,
            recorded_at: chrono::Utc::now(),
        };
        setting.validate()?;
        if let Some(readings) = &submission.observed {
            readings.validate()?;
        }

        if self.store.patient(patient_id).await?.is_none() {
            return Err(LookupError::Patient(patient_id.to_string()).into());
        }
        // Read-then-write; assumes one clinician charts a patient at a time.
        if self.store.vent_setting(patient_id, at).await?.is_some() {
            return Err(SubmissionError::Duplicate { patient_id: patient_id.to_string(), time_interval: at });
        }

        self.store.upsert_vent_setting(&setting).await?;
        info!(%submission_id, "ventilation settings stored");

        let observed = match submission.observed {
            Some(readings) => ObservedData::new(patient_id, at, readings),
            None => simulate_observed(&setting, &mut rand::thread_rng()),
        };
        self.store.upsert_observed(&observed).await?;

        let derived = derive_features(self.store.as_ref(), &observed).await?;
        let features = assemble_features(self.store.as_ref(), &self.schema, patient_id, at).await?;

        let prediction = match predict_outcomes(self.classifier.as_ref(), patient_id, at, &features) {
            Ok(prediction) => {
                self.store.upsert_prediction(&prediction).await?;
                let alerts = prediction.out_of_range();
                if alerts.is_empty() {
                    info!(%submission_id, "all parameters predicted in range");
                } else {
                    warn!(%submission_id, ?alerts, "parameters predicted out of range");
                }
                PredictionStatus::Predicted { prediction, alerts }
            }
            Err(err) => {
                warn!(%submission_id, error = %err, "prediction failed, interval data kept");
                PredictionStatus::Failed { error: err.to_string() }
            }
        };

        Ok(IntervalOutcome {
            submission_id,
            patient_id: patient_id.to_string(),
            time_interval: at,
            observed,
            derived,
            features,
            prediction,
        })
    }

    // ===== Dashboard =====

    #[instrument(skip(self))]
    pub async fn timeline(&self, patient_id: &str) -> Result<PatientTimeline, SubmissionError> {
        if self.store.patient(patient_id).await?.is_none() {
            return Err(LookupError::Patient(patient_id.to_string()).into());
        }

        let observed = self.store.observed_history(patient_id).await?;
        let predictions = self.store.predictions(patient_id).await?;

        let out_of_range_times = predictions
            .iter()
            .filter(|p| !p.out_of_range().is_empty())
            .map(|p| p.time_interval)
            .collect();

        let mut by_time: BTreeMap<Interval, Prediction> =
            predictions.into_iter().map(|p| (p.time_interval, p)).collect();

        let points = observed
            .into_iter()
            .map(|o| TimelinePoint {
                time_interval: o.time_interval,
                tv: o.readings.tv,
                etco2: o.readings.etco2,
                spo2: o.readings.spo2,
                pplat: o.readings.pplat,
                prediction: by_time.remove(&o.time_interval),
            })
            .collect();

        Ok(PatientTimeline { patient_id: patient_id.to_string(), points, out_of_range_times })
    }
}
