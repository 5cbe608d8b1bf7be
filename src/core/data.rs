//! Monitor simulator.
//!
//! Stands in for a bedside monitor feed until one is integrated. Readings
//! scatter uniformly around typical adult values; tidal volume and rate
//! follow the ventilator settings.

use chrono::Utc;
use rand::Rng;

use crate::models::{ObservedData, ObservedReadings, VentSetting};

/// Produce one interval of observed data for `setting`.
pub fn simulate_observed<R: Rng + ?Sized>(setting: &VentSetting, rng: &mut R) -> ObservedData {
    let tv = setting.tv_setting + rng.gen_range(-50..=50) as f64;
    let etco2 = 35.0 + rng.gen_range(-5.0..=5.0);
    let spo2 = 95.0 + rng.gen_range(-3.0..=3.0);
    let pplat = 20.0 + rng.gen_range(-3.0..=3.0);

    let readings = ObservedReadings {
        generated_mv: Some(tv * setting.ventilator_rate / 1000.0),
        ppeak: Some(pplat + rng.gen_range(0.0..=2.0)),
        sbp: Some(120.0 + rng.gen_range(-10..=10) as f64),
        dbp: Some(80.0 + rng.gen_range(-5..=5) as f64),
        hr: Some(80.0 + rng.gen_range(-10..=10) as f64),
        rr: Some(setting.ventilator_rate),
        ph: Some(7.4 + rng.gen_range(-0.05..=0.05)),
        po2: Some(90.0 + rng.gen_range(-5.0..=5.0)),
        pco2: Some(etco2 + rng.gen_range(-2.0..=2.0)),
        hco3: Some(24.0 + rng.gen_range(-2.0..=2.0)),
        be: Some(rng.gen_range(-2.0..=2.0)),
        lactate: Some(1.0 + rng.gen_range(0.0..=1.0)),
        tv: Some(tv),
        etco2: Some(etco2),
        spo2: Some(spo2),
        pplat: Some(pplat),
    };

    ObservedData {
        patient_id: setting.patient_id.clone(),
        time_interval: setting.time_interval,
        readings,
        recorded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Interval;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn readings_track_the_settings() {
        let setting = VentSetting {
            patient_id: "P001".into(),
            time_interval: Interval::new(45).unwrap(),
            tv_setting: 450.0,
            fio2: 0.5,
            ventilator_rate: 16.0,
            ie_ratio: "1:2".into(),
            peep: 8.0,
            ps: 12.0,
            recorded_at: Utc::now(),
        };
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let observed = simulate_observed(&setting, &mut rng);
            let r = &observed.readings;
            assert_eq!(observed.time_interval, setting.time_interval);
            assert!((400.0..=500.0).contains(&r.tv.unwrap()));
            assert_eq!(r.rr, Some(16.0));
            assert!((r.generated_mv.unwrap() - r.tv.unwrap() * 16.0 / 1000.0).abs() < 1e-9);
            assert!(r.ppeak.unwrap() >= r.pplat.unwrap());
            assert!((92.0..=98.0).contains(&r.spo2.unwrap()));
        }
    }
}
