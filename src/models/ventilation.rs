use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::interval::Interval;

/// Ventilator settings charted for one interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, sqlx::FromRow)]
pub struct VentSetting {
    #[validate(length(min = 1))]
    pub patient_id: String,
    #[sqlx(try_from = "i64")]
    pub time_interval: Interval,
    /// Set tidal volume, mL.
    #[validate(range(min = 0.0))]
    pub tv_setting: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub fio2: f64,
    /// Mandatory breaths per minute.
    #[validate(range(min = 0.0))]
    pub ventilator_rate: f64,
    /// Inspiratory:expiratory ratio as charted, e.g. `"1:2"`.
    #[validate(custom = "validate_ie_ratio")]
    pub ie_ratio: String,
    #[validate(range(min = 0.0))]
    pub peep: f64,
    /// Pressure support, cmH₂O.
    #[validate(range(min = 0.0))]
    pub ps: f64,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

/// Entry rule for the I:E ratio: two positive integers around a colon.
fn validate_ie_ratio(ratio: &str) -> Result<(), ValidationError> {
    let positive = |part: &str| {
        !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) && part.parse::<u32>().map_or(false, |n| n > 0)
    };
    match ratio.split_once(':') {
        Some((insp, exp)) if positive(insp) && positive(exp) => Ok(()),
        _ => {
            let mut err = ValidationError::new("ie_ratio");
            err.message = Some("I:E Ratio must be in format 'int:int', e.g., 1:2, both positive integers.".into());
            Err(err)
        }
    }
}

/// Measurements taken at one interval. Any channel may be missing; charted
/// values are range-checked at entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, sqlx::FromRow)]
pub struct ObservedReadings {
    /// Minute volume generated, L/min.
    #[validate(range(min = 0.0))]
    pub generated_mv: Option<f64>,
    #[validate(range(min = 0.0))]
    pub ppeak: Option<f64>,
    #[validate(range(min = 0.0))]
    pub sbp: Option<f64>,
    #[validate(range(min = 0.0))]
    pub dbp: Option<f64>,
    #[validate(range(min = 0.0))]
    pub hr: Option<f64>,
    #[validate(range(min = 0.0))]
    pub rr: Option<f64>,
    #[validate(range(min = 6.8, max = 7.8))]
    pub ph: Option<f64>,
    #[validate(range(min = 0.0))]
    pub po2: Option<f64>,
    #[validate(range(min = 0.0))]
    pub pco2: Option<f64>,
    #[validate(range(min = 0.0))]
    pub hco3: Option<f64>,
    /// Base excess, mmol/L.
    #[validate(range(min = -10.0, max = 10.0))]
    pub be: Option<f64>,
    #[validate(range(min = 0.0))]
    pub lactate: Option<f64>,
    #[validate(range(min = 0.0))]
    pub tv: Option<f64>,
    #[validate(range(min = 0.0))]
    pub etco2: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub spo2: Option<f64>,
    #[validate(range(min = 0.0))]
    pub pplat: Option<f64>,
}

impl ObservedReadings {
    /// Value of a channel by column name, for the channels that feed
    /// lag and delta features.
    pub fn channel(&self, name: &str) -> Option<f64> {
        match name {
            "tv" => self.tv,
            "etco2" => self.etco2,
            "spo2" => self.spo2,
            "pplat" => self.pplat,
            "hr" => self.hr,
            "rr" => self.rr,
            _ => None,
        }
    }
}

/// Observed physiological data for one interval, from the monitor
/// simulator or manual charting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ObservedData {
    pub patient_id: String,
    #[sqlx(try_from = "i64")]
    pub time_interval: Interval,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub readings: ObservedReadings,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

impl ObservedData {
    pub fn new(patient_id: impl Into<String>, time_interval: Interval, readings: ObservedReadings) -> Self {
        Self {
            patient_id: patient_id.into(),
            time_interval,
            readings,
            recorded_at: Utc::now(),
        }
    }
}
