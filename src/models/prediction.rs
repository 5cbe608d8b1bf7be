use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::interval::Interval;
use super::parameter::Parameter;

/// Classifier verdict for one interval: `1` if the parameter is expected to
/// stay within its target range at the next interval, `0` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Prediction {
    pub patient_id: String,
    #[sqlx(try_from = "i64")]
    pub time_interval: Interval,
    pub tv_in_range_next: i64,
    pub etco2_in_range_next: i64,
    pub spo2_in_range_next: i64,
    pub pplat_in_range_next: i64,
    #[serde(default = "Utc::now")]
    pub predicted_at: DateTime<Utc>,
}

impl Prediction {
    pub fn label(&self, parameter: Parameter) -> i64 {
        match parameter {
            Parameter::TidalVolume => self.tv_in_range_next,
            Parameter::EndTidalCo2 => self.etco2_in_range_next,
            Parameter::Spo2 => self.spo2_in_range_next,
            Parameter::PlateauPressure => self.pplat_in_range_next,
        }
    }

    /// Alert labels for every parameter predicted to leave its range,
    /// in classifier output order. Empty means all in range.
    pub fn out_of_range(&self) -> Vec<&'static str> {
        Parameter::ALL
            .into_iter()
            .filter(|p| self.label(*p) == 0)
            .map(Parameter::label)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_lists_labels_in_order() {
        let prediction = Prediction {
            patient_id: "P001".into(),
            time_interval: Interval::START,
            tv_in_range_next: 0,
            etco2_in_range_next: 1,
            spo2_in_range_next: 1,
            pplat_in_range_next: 0,
            predicted_at: Utc::now(),
        };
        assert_eq!(prediction.out_of_range(), vec!["Tidal Volume (TV)", "Plateau Pressure"]);
    }
}
