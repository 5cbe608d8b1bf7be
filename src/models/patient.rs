use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::parameter::{Parameter, TargetBand};

/// Static patient profile: demographics, comorbidities, intubation details
/// and the clinician-set ventilation targets.
///
/// Entered once and upserted by `patient_id`; re-entry is how target ranges
/// change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, sqlx::FromRow)]
#[validate(schema(function = "validate_target_order", skip_on_field_errors = false))]
pub struct Patient {
    #[validate(length(min = 1, message = "Patient ID is required"))]
    pub patient_id: String,
    pub gender: String,
    #[validate(range(min = 0, max = 120))]
    pub age: i64,
    #[validate(range(min = 30.0, max = 250.0))]
    pub height: f64,
    #[validate(range(min = 1.0, max = 300.0))]
    pub weight: f64,

    // Comorbidities
    #[serde(default)]
    pub comorbid_nkmi: bool,
    #[serde(default)]
    pub comorbid_dm: bool,
    #[serde(default)]
    pub comorbid_hpt: bool,
    #[serde(default)]
    pub comorbid_ihd: bool,
    #[serde(default)]
    pub comorbid_ckd: bool,
    #[serde(default)]
    pub comorbid_ba: bool,
    #[serde(default)]
    pub comorbid_copd: bool,
    #[serde(default)]
    pub comorbid_others: bool,

    // Intubation
    #[serde(default)]
    pub indication_intubation: Option<String>,
    #[serde(default)]
    #[validate(range(min = 3, max = 15))]
    pub gcs: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub fio2_prior: Option<f64>,
    #[serde(default)]
    pub induction_agent: Option<String>,
    #[serde(default)]
    pub paralytic_agent: Option<String>,
    #[serde(default)]
    #[validate(range(min = 2.0, max = 12.0))]
    pub ett_size: Option<f64>,
    #[serde(default)]
    pub stratified_lung_pathology: Option<String>,
    #[serde(default)]
    pub sedation: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,

    // Target ranges
    pub min_tv: Option<f64>,
    pub max_tv: Option<f64>,
    pub min_etco2: Option<f64>,
    pub max_etco2: Option<f64>,
    pub min_spo2: Option<f64>,
    pub max_spo2: Option<f64>,
    pub max_pplat: Option<f64>,
}

impl Patient {
    /// Target band for `parameter`. Plateau pressure has no clinical minimum.
    pub fn target_band(&self, parameter: Parameter) -> TargetBand {
        match parameter {
            Parameter::TidalVolume => TargetBand::between(self.min_tv, self.max_tv),
            Parameter::EndTidalCo2 => TargetBand::between(self.min_etco2, self.max_etco2),
            Parameter::Spo2 => TargetBand::between(self.min_spo2, self.max_spo2),
            Parameter::PlateauPressure => TargetBand::capped(self.max_pplat),
        }
    }
}

fn validate_target_order(patient: &Patient) -> Result<(), ValidationError> {
    let pairs = [
        (patient.min_tv, patient.max_tv),
        (patient.min_etco2, patient.max_etco2),
        (patient.min_spo2, patient.max_spo2),
        (Some(0.0), patient.max_pplat),
    ];
    for (min, max) in pairs {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                let mut err = ValidationError::new("target_order");
                err.message = Some("target minimum must not exceed maximum".into());
                return Err(err);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Patient;

    /// Adult on default targets: TV 400-600, ETCO₂ 35-45, SpO₂ 92-100, Pplat ≤ 30.
    pub fn patient(patient_id: &str) -> Patient {
        Patient {
            patient_id: patient_id.to_string(),
            gender: "Male".to_string(),
            age: 54,
            height: 172.0,
            weight: 78.0,
            comorbid_nkmi: false,
            comorbid_dm: true,
            comorbid_hpt: true,
            comorbid_ihd: false,
            comorbid_ckd: false,
            comorbid_ba: false,
            comorbid_copd: false,
            comorbid_others: false,
            indication_intubation: Some("FAILURE OF OXYGENATION".to_string()),
            gcs: Some(15),
            fio2_prior: Some(0.21),
            induction_agent: Some("Propofol".to_string()),
            paralytic_agent: Some("Rocuronium".to_string()),
            ett_size: Some(7.5),
            stratified_lung_pathology: Some("RESTRICTIVE LUNG".to_string()),
            sedation: Some("PROPOFOL + FENTANYL".to_string()),
            condition: Some("ARDS".to_string()),
            min_tv: Some(400.0),
            max_tv: Some(600.0),
            min_etco2: Some(35.0),
            max_etco2: Some(45.0),
            min_spo2: Some(92.0),
            max_spo2: Some(100.0),
            max_pplat: Some(30.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::patient;
    use super::*;

    #[test]
    fn default_patient_is_valid() {
        assert!(patient("P001").validate().is_ok());
    }

    #[test]
    fn empty_id_is_rejected() {
        let p = patient("");
        assert!(p.validate().is_err());
    }

    #[test]
    fn inverted_targets_are_rejected() {
        let mut p = patient("P001");
        p.min_spo2 = Some(99.0);
        p.max_spo2 = Some(92.0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn plateau_band_has_a_floor_not_a_target() {
        let band = patient("P001").target_band(Parameter::PlateauPressure);
        assert_eq!(band.distance_low(Some(20.0)), None);
        assert_eq!(band.contains(Some(20.0)), Some(true));
    }

    #[test]
    fn comorbidities_default_to_false() {
        let json = serde_json::json!({
            "patient_id": "P002",
            "gender": "Female",
            "age": 61,
            "height": 160.0,
            "weight": 55.0,
            "min_tv": 350.0,
            "max_tv": 500.0,
            "min_etco2": null,
            "max_etco2": null,
            "min_spo2": 90.0,
            "max_spo2": 98.0,
            "max_pplat": 28.0
        });
        let p: Patient = serde_json::from_value(json).unwrap();
        assert!(!p.comorbid_copd);
        assert_eq!(p.gcs, None);
    }
}
