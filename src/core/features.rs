use tracing::{debug, instrument, warn};

use crate::db::RecordStore;
use crate::error::{LookupError, PipelineError};
use crate::models::{DerivedFeature, ObservedData, ObservedReadings, Parameter, Patient, TargetBand, VentSetting};

/// Derive features for `current` and upsert them.
///
/// The predecessor is the observed row exactly one interval earlier; a
/// missing predecessor leaves lag and delta features null. The settings row
/// is the one charted at the same interval, falling back to the latest one
/// charted before it.
#[instrument(skip(store, current), fields(patient_id = %current.patient_id, time = %current.time_interval))]
pub async fn derive_features(
    store: &dyn RecordStore,
    current: &ObservedData,
) -> Result<DerivedFeature, PipelineError> {
    let patient_id = current.patient_id.as_str();
    let at = current.time_interval;

    let patient = store
        .patient(patient_id)
        .await?
        .ok_or_else(|| LookupError::Patient(patient_id.to_string()))?;

    let setting = match store.vent_setting(patient_id, at).await? {
        Some(setting) => setting,
        None => store.latest_vent_setting(patient_id, at).await?.ok_or_else(|| {
            LookupError::VentSettings { patient_id: patient_id.to_string(), time_interval: at }
        })?,
    };

    let previous = match at.previous() {
        Some(before) => {
            let row = store.observed(patient_id, before).await?;
            if row.is_none() {
                warn!(%before, "no observed data for previous interval, lag features left empty");
            }
            row
        }
        None => None,
    };

    let derived = compute_features(&patient, &setting, current, previous.as_ref());
    store.upsert_derived(&derived).await?;
    debug!("derived features stored");
    Ok(derived)
}

/// Compute the derived row from already-loaded records. Never fails: any
/// undefined arithmetic yields a null feature.
pub fn compute_features(
    patient: &Patient,
    setting: &VentSetting,
    current: &ObservedData,
    previous: Option<&ObservedData>,
) -> DerivedFeature {
    let now = &current.readings;
    let before = previous.map(|p| &p.readings);
    let mut f = DerivedFeature::empty(current.patient_id.clone(), current.time_interval);

    let delta = |p: Parameter| {
        let (cur, prev) = (now.channel(p.key()), lag(before, p.key()));
        (difference(cur, prev), percent_change(cur, prev))
    };
    (f.tv_diff, f.tv_pct_change) = delta(Parameter::TidalVolume);
    (f.etco2_diff, f.etco2_pct_change) = delta(Parameter::EndTidalCo2);
    (f.spo2_diff, f.spo2_pct_change) = delta(Parameter::Spo2);
    (f.pplat_diff, f.pplat_pct_change) = delta(Parameter::PlateauPressure);

    f.tv_lag1 = lag(before, "tv");
    f.etco2_lag1 = lag(before, "etco2");
    f.spo2_lag1 = lag(before, "spo2");
    f.pplat_lag1 = lag(before, "pplat");
    f.hr_lag1 = lag(before, "hr");
    f.rr_lag1 = lag(before, "rr");

    let tv = patient.target_band(Parameter::TidalVolume);
    f.tv_dist_low = tv.distance_low(now.tv);
    f.tv_dist_high = tv.distance_high(now.tv);
    f.tv_dist_closest = tv.distance_closest(now.tv);
    f.tv_in_range = in_range_flag(&tv, now.tv);

    let etco2 = patient.target_band(Parameter::EndTidalCo2);
    f.etco2_dist_low = etco2.distance_low(now.etco2);
    f.etco2_dist_high = etco2.distance_high(now.etco2);
    f.etco2_dist_closest = etco2.distance_closest(now.etco2);
    f.etco2_in_range = in_range_flag(&etco2, now.etco2);

    let spo2 = patient.target_band(Parameter::Spo2);
    f.spo2_dist_low = spo2.distance_low(now.spo2);
    f.spo2_dist_high = spo2.distance_high(now.spo2);
    f.spo2_dist_closest = spo2.distance_closest(now.spo2);
    f.spo2_in_range = in_range_flag(&spo2, now.spo2);

    let pplat = patient.target_band(Parameter::PlateauPressure);
    f.pplat_dist_high = pplat.distance_high(now.pplat);
    f.pplat_dist_closest = pplat.distance_closest(now.pplat);
    f.pplat_in_range = in_range_flag(&pplat, now.pplat);

    f.ie_ratio_numeric = parse_ie_ratio(&setting.ie_ratio);
    f
}

/// Convert a charted `"insp:exp"` ratio to `exp / insp`, so `"1:2"` is `2.0`.
/// Anything unparseable, or a non-positive side, gives `None`.
pub fn parse_ie_ratio(ratio: &str) -> Option<f64> {
    let (insp, exp) = ratio.split_once(':')?;
    let insp: f64 = insp.trim().parse().ok()?;
    let exp: f64 = exp.trim().parse().ok()?;
    if insp > 0.0 && exp > 0.0 && insp.is_finite() && exp.is_finite() {
        Some(exp / insp)
    } else {
        None
    }
}

fn lag(previous: Option<&ObservedReadings>, channel: &str) -> Option<f64> {
    previous.and_then(|p| p.channel(channel))
}

fn difference(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    Some(current? - previous?)
}

fn percent_change(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    let previous = previous?;
    if previous == 0.0 {
        return None;
    }
    let change = (current? - previous) / previous * 100.0;
    change.is_finite().then_some(change)
}

fn in_range_flag(band: &TargetBand, value: Option<f64>) -> Option<i64> {
    band.contains(value).map(i64::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::patient::fixtures::patient;
    use crate::models::Interval;
    use chrono::Utc;
    use test_case::test_case;

    fn setting(at: i64, ie_ratio: &str) -> VentSetting {
        VentSetting {
            patient_id: "P001".into(),
            time_interval: Interval::new(at).unwrap(),
            tv_setting: 400.0,
            fio2: 0.4,
            ventilator_rate: 14.0,
            ie_ratio: ie_ratio.into(),
            peep: 5.0,
            ps: 10.0,
            recorded_at: Utc::now(),
        }
    }

    fn observed(at: i64, tv: f64) -> ObservedData {
        let readings = ObservedReadings {
            tv: Some(tv),
            etco2: Some(38.0),
            spo2: Some(96.0),
            pplat: Some(22.0),
            hr: Some(84.0),
            rr: Some(14.0),
            ..Default::default()
        };
        ObservedData::new("P001", Interval::new(at).unwrap(), readings)
    }

    #[test_case("1:2", Some(2.0))]
    #[test_case("2:1", Some(0.5))]
    #[test_case(" 1 : 3 ", Some(3.0))]
    #[test_case("abc", None)]
    #[test_case("1:0", None)]
    #[test_case("0:2", None)]
    #[test_case("-1:2", None)]
    #[test_case("1:2:3", None)]
    fn ie_ratio_parsing(ratio: &str, expected: Option<f64>) {
        assert_eq!(parse_ie_ratio(ratio), expected);
    }

    #[test]
    fn first_interval_has_no_lag_or_delta() {
        let f = compute_features(&patient("P001"), &setting(0, "1:2"), &observed(0, 420.0), None);
        assert_eq!(f.tv_in_range, Some(1));
        assert_eq!(f.tv_dist_low, Some(20.0));
        assert_eq!(f.tv_dist_high, Some(180.0));
        assert_eq!(f.tv_dist_closest, Some(20.0));
        assert_eq!(f.tv_diff, None);
        assert_eq!(f.tv_pct_change, None);
        assert_eq!(f.hr_lag1, None);
        assert_eq!(f.ie_ratio_numeric, Some(2.0));
    }

    #[test]
    fn deltas_follow_the_previous_interval() {
        let prev = observed(0, 420.0);
        let f = compute_features(&patient("P001"), &setting(15, "1:2"), &observed(15, 650.0), Some(&prev));
        assert_eq!(f.tv_in_range, Some(0));
        assert_eq!(f.tv_diff, Some(230.0));
        assert!((f.tv_pct_change.unwrap() - 54.7619).abs() < 1e-3);
        assert_eq!(f.tv_lag1, Some(420.0));
        assert_eq!(f.etco2_diff, Some(0.0));
        assert_eq!(f.rr_lag1, Some(14.0));
    }

    #[test]
    fn zero_predecessor_gives_null_percent_change() {
        let mut prev = observed(0, 420.0);
        prev.readings.pplat = Some(0.0);
        let f = compute_features(&patient("P001"), &setting(15, "1:2"), &observed(15, 430.0), Some(&prev));
        assert_eq!(f.pplat_diff, Some(22.0));
        assert_eq!(f.pplat_pct_change, None);
    }

    #[test]
    fn plateau_closest_is_distance_to_maximum() {
        let f = compute_features(&patient("P001"), &setting(0, "1:2"), &observed(0, 420.0), None);
        assert_eq!(f.pplat_dist_high, Some(8.0));
        assert_eq!(f.pplat_dist_closest, f.pplat_dist_high);
        assert_eq!(f.pplat_in_range, Some(1));
    }

    #[test]
    fn missing_reading_nulls_its_features() {
        let mut current = observed(0, 420.0);
        current.readings.spo2 = None;
        let f = compute_features(&patient("P001"), &setting(0, "1:2"), &current, None);
        assert_eq!(f.spo2_in_range, None);
        assert_eq!(f.spo2_dist_low, None);
        assert_eq!(f.spo2_dist_closest, None);
    }

    #[tokio::test]
    async fn derive_requires_patient() {
        let store = MemoryStore::new();
        let err = derive_features(&store, &observed(0, 420.0)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Lookup(LookupError::Patient(id)) if id == "P001"));
    }

    #[tokio::test]
    async fn derive_requires_settings() {
        let store = MemoryStore::new();
        store.upsert_patient(&patient("P001")).await.unwrap();
        let err = derive_features(&store, &observed(0, 420.0)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Lookup(LookupError::VentSettings { .. })));
    }

    #[tokio::test]
    async fn derive_tolerates_a_gap_and_persists() {
        let store = MemoryStore::new();
        store.upsert_patient(&patient("P001")).await.unwrap();
        store.upsert_vent_setting(&setting(0, "1:2")).await.unwrap();
        store.upsert_observed(&observed(0, 420.0)).await.unwrap();

        // Nothing charted at 15, so 30 has no predecessor; settings fall back to t=0.
        let current = observed(30, 500.0);
        let derived = derive_features(&store, &current).await.unwrap();
        assert_eq!(derived.tv_lag1, None);
        assert_eq!(derived.tv_diff, None);
        assert_eq!(derived.ie_ratio_numeric, Some(2.0));

        let stored = store.derived("P001", current.time_interval).await.unwrap();
        assert_eq!(stored, Some(derived));
    }

    #[tokio::test]
    async fn derive_prefers_settings_at_the_same_interval() {
        let store = MemoryStore::new();
        store.upsert_patient(&patient("P001")).await.unwrap();
        store.upsert_vent_setting(&setting(0, "1:2")).await.unwrap();
        store.upsert_vent_setting(&setting(15, "1:3")).await.unwrap();
        store.upsert_observed(&observed(0, 420.0)).await.unwrap();

        let derived = derive_features(&store, &observed(15, 650.0)).await.unwrap();
        assert_eq!(derived.ie_ratio_numeric, Some(3.0));
        assert_eq!(derived.tv_diff, Some(230.0));
    }
}
