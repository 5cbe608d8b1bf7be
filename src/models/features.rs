use serde::{Deserialize, Serialize};

use super::interval::Interval;

/// Engineered features for one interval, computed from the observed rows at
/// `t` and `t-15` plus the patient's target ranges. Never entered by hand.
///
/// Lag and delta features are null at the first interval or when the
/// preceding row is missing. Range flags are `1`/`0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DerivedFeature {
    pub patient_id: String,
    #[sqlx(try_from = "i64")]
    pub time_interval: Interval,

    // Delta
    pub tv_diff: Option<f64>,
    pub tv_pct_change: Option<f64>,
    pub etco2_diff: Option<f64>,
    pub etco2_pct_change: Option<f64>,
    pub spo2_diff: Option<f64>,
    pub spo2_pct_change: Option<f64>,
    pub pplat_diff: Option<f64>,
    pub pplat_pct_change: Option<f64>,

    // Lag
    pub tv_lag1: Option<f64>,
    pub etco2_lag1: Option<f64>,
    pub spo2_lag1: Option<f64>,
    pub pplat_lag1: Option<f64>,
    pub hr_lag1: Option<f64>,
    pub rr_lag1: Option<f64>,

    // Distance to target
    pub tv_dist_low: Option<f64>,
    pub tv_dist_high: Option<f64>,
    pub tv_dist_closest: Option<f64>,
    pub etco2_dist_low: Option<f64>,
    pub etco2_dist_high: Option<f64>,
    pub etco2_dist_closest: Option<f64>,
    pub spo2_dist_low: Option<f64>,
    pub spo2_dist_high: Option<f64>,
    pub spo2_dist_closest: Option<f64>,
    pub pplat_dist_high: Option<f64>,
    pub pplat_dist_closest: Option<f64>,

    // Range status
    pub tv_in_range: Option<i64>,
    pub etco2_in_range: Option<i64>,
    pub spo2_in_range: Option<i64>,
    pub pplat_in_range: Option<i64>,

    pub ie_ratio_numeric: Option<f64>,
}

impl DerivedFeature {
    /// A row with every feature null.
    pub fn empty(patient_id: impl Into<String>, time_interval: Interval) -> Self {
        DerivedFeature {
            patient_id: patient_id.into(),
            time_interval,
            tv_diff: None,
            tv_pct_change: None,
            etco2_diff: None,
            etco2_pct_change: None,
            spo2_diff: None,
            spo2_pct_change: None,
            pplat_diff: None,
            pplat_pct_change: None,
            tv_lag1: None,
            etco2_lag1: None,
            spo2_lag1: None,
            pplat_lag1: None,
            hr_lag1: None,
            rr_lag1: None,
            tv_dist_low: None,
            tv_dist_high: None,
            tv_dist_closest: None,
            etco2_dist_low: None,
            etco2_dist_high: None,
            etco2_dist_closest: None,
            spo2_dist_low: None,
            spo2_dist_high: None,
            spo2_dist_closest: None,
            pplat_dist_high: None,
            pplat_dist_closest: None,
            tv_in_range: None,
            etco2_in_range: None,
            spo2_in_range: None,
            pplat_in_range: None,
            ie_ratio_numeric: None,
        }
    }
}
