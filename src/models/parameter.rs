use serde::{Deserialize, Serialize};

/// The four ventilation targets the classifier predicts, in the fixed order
/// of its output vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    TidalVolume,
    EndTidalCo2,
    Spo2,
    PlateauPressure,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::TidalVolume,
        Parameter::EndTidalCo2,
        Parameter::Spo2,
        Parameter::PlateauPressure,
    ];

    /// Column prefix shared by observed and derived fields.
    pub fn key(self) -> &'static str {
        match self {
            Parameter::TidalVolume => "tv",
            Parameter::EndTidalCo2 => "etco2",
            Parameter::Spo2 => "spo2",
            Parameter::PlateauPressure => "pplat",
        }
    }

    /// Name shown to clinicians in alerts.
    pub fn label(self) -> &'static str {
        match self {
            Parameter::TidalVolume => "Tidal Volume (TV)",
            Parameter::EndTidalCo2 => "ETCO₂",
            Parameter::Spo2 => "SpO₂",
            Parameter::PlateauPressure => "Plateau Pressure",
        }
    }
}

/// Lower edge of a target band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LowerBound {
    /// Clinician-set minimum; distances are measured against it.
    Target(f64),
    /// Physical floor with no clinical meaning; only used for range checks.
    Floor(f64),
}

impl LowerBound {
    pub fn value(self) -> f64 {
        match self {
            LowerBound::Target(v) | LowerBound::Floor(v) => v,
        }
    }
}

/// Target range for one parameter. A missing bound makes every feature that
/// depends on it null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetBand {
    pub lower: Option<LowerBound>,
    pub upper: Option<f64>,
}

impl TargetBand {
    pub fn between(min: Option<f64>, max: Option<f64>) -> Self {
        TargetBand { lower: min.map(LowerBound::Target), upper: max }
    }

    /// Band with only a clinical maximum; the lower edge is a floor at zero.
    pub fn capped(max: Option<f64>) -> Self {
        TargetBand { lower: Some(LowerBound::Floor(0.0)), upper: max }
    }

    /// `Some(true)` when `lower <= value <= upper`, inclusive on both ends.
    pub fn contains(&self, value: Option<f64>) -> Option<bool> {
        let value = value?;
        let lower = self.lower?.value();
        let upper = self.upper?;
        Some(lower <= value && value <= upper)
    }

    pub fn distance_low(&self, value: Option<f64>) -> Option<f64> {
        match self.lower? {
            LowerBound::Target(min) => Some(value? - min),
            LowerBound::Floor(_) => None,
        }
    }

    pub fn distance_high(&self, value: Option<f64>) -> Option<f64> {
        Some(self.upper? - value?)
    }

    /// Absolute gap to the nearest target bound. Floors are not targets, so a
    /// capped band measures only against its maximum.
    pub fn distance_closest(&self, value: Option<f64>) -> Option<f64> {
        let value = value?;
        let high = (self.upper? - value).abs();
        match self.lower? {
            LowerBound::Target(min) => Some(high.min((value - min).abs())),
            LowerBound::Floor(_) => Some(high),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let band = TargetBand::between(Some(400.0), Some(600.0));
        assert_eq!(band.contains(Some(400.0)), Some(true));
        assert_eq!(band.contains(Some(600.0)), Some(true));
        assert_eq!(band.contains(Some(600.5)), Some(false));
        assert_eq!(band.contains(None), None);
    }

    #[test]
    fn missing_bound_nulls_dependent_features() {
        let band = TargetBand::between(None, Some(45.0));
        assert_eq!(band.contains(Some(40.0)), None);
        assert_eq!(band.distance_low(Some(40.0)), None);
        assert_eq!(band.distance_high(Some(40.0)), Some(5.0));
        assert_eq!(band.distance_closest(Some(40.0)), None);
    }

    #[test]
    fn capped_band_measures_only_against_maximum() {
        let band = TargetBand::capped(Some(30.0));
        assert_eq!(band.distance_low(Some(2.0)), None);
        assert_eq!(band.distance_closest(Some(2.0)), Some(28.0));
        assert_eq!(band.contains(Some(0.0)), Some(true));
        assert_eq!(band.contains(Some(-1.0)), Some(false));
    }

    #[test]
    fn closest_distance_never_exceeds_either_side() {
        let band = TargetBand::between(Some(35.0), Some(45.0));
        for value in [20.0, 35.0, 38.5, 40.0, 44.0, 52.0] {
            let closest = band.distance_closest(Some(value)).unwrap();
            assert!(closest <= band.distance_low(Some(value)).unwrap().abs());
            assert!(closest <= band.distance_high(Some(value)).unwrap().abs());
        }
    }
}
