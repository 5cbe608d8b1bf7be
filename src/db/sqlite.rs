//! SQLite record store.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};

use super::RecordStore;
use crate::error::StoreError;
use crate::models::{DerivedFeature, Interval, ObservedData, Patient, Prediction, VentSetting};

/// Record store over a SQLite connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and make sure every
    /// table exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // An in-memory database lives and dies with its connection.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().max_connections(5).connect_with(options).await?
        };

        let store = Self { pool };
        store.initialize_schema().await?;
        info!(url, "record store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn initialize_schema(&self) -> Result<(), StoreError> {
        // Patients table
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS patients (
                patient_id TEXT PRIMARY KEY,
                gender TEXT NOT NULL,
                age INTEGER NOT NULL,
                height REAL NOT NULL,
                weight REAL NOT NULL,
                comorbid_nkmi BOOLEAN NOT NULL,
                comorbid_dm BOOLEAN NOT NULL,
                comorbid_hpt BOOLEAN NOT NULL,
                comorbid_ihd BOOLEAN NOT NULL,
                comorbid_ckd BOOLEAN NOT NULL,
                comorbid_ba BOOLEAN NOT NULL,
                comorbid_copd BOOLEAN NOT NULL,
                comorbid_others BOOLEAN NOT NULL,
                indication_intubation TEXT,
                gcs INTEGER,
                fio2_prior REAL,
                induction_agent TEXT,
                paralytic_agent TEXT,
                ett_size REAL,
                stratified_lung_pathology TEXT,
                sedation TEXT,
                condition TEXT,
                min_tv REAL,
                max_tv REAL,
                min_etco2 REAL,
                max_etco2 REAL,
                min_spo2 REAL,
                max_spo2 REAL,
                max_pplat REAL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Ventilator settings table
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vent_settings (
                patient_id TEXT NOT NULL,
                time_interval INTEGER NOT NULL,
                tv_setting REAL NOT NULL,
                fio2 REAL NOT NULL,
                ventilator_rate REAL NOT NULL,
                ie_ratio TEXT NOT NULL,
                peep REAL NOT NULL,
                ps REAL NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (patient_id, time_interval),
                FOREIGN KEY (patient_id) REFERENCES patients(patient_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // Observed data table
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS observed_data (
                patient_id TEXT NOT NULL,
                time_interval INTEGER NOT NULL,
                generated_mv REAL,
                ppeak REAL,
                sbp REAL,
                dbp REAL,
                hr REAL,
                rr REAL,
                ph REAL,
                po2 REAL,
                pco2 REAL,
                hco3 REAL,
                be REAL,
                lactate REAL,
                tv REAL,
                etco2 REAL,
                spo2 REAL,
                pplat REAL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (patient_id, time_interval),
                FOREIGN KEY (patient_id) REFERENCES patients(patient_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // Derived features table
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS derived_features (
                patient_id TEXT NOT NULL,
                time_interval INTEGER NOT NULL,
                tv_diff REAL,
                tv_pct_change REAL,
                etco2_diff REAL,
                etco2_pct_change REAL,
                spo2_diff REAL,
                spo2_pct_change REAL,
                pplat_diff REAL,
                pplat_pct_change REAL,
                tv_lag1 REAL,
                etco2_lag1 REAL,
                spo2_lag1 REAL,
                pplat_lag1 REAL,
                hr_lag1 REAL,
                rr_lag1 REAL,
                tv_dist_low REAL,
                tv_dist_high REAL,
                tv_dist_closest REAL,
                etco2_dist_low REAL,
                etco2_dist_high REAL,
                etco2_dist_closest REAL,
                spo2_dist_low REAL,
                spo2_dist_high REAL,
                spo2_dist_closest REAL,
                pplat_dist_high REAL,
                pplat_dist_closest REAL,
                tv_in_range INTEGER,
                etco2_in_range INTEGER,
                spo2_in_range INTEGER,
                pplat_in_range INTEGER,
                ie_ratio_numeric REAL,
                PRIMARY KEY (patient_id, time_interval),
                FOREIGN KEY (patient_id) REFERENCES patients(patient_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // Predictions table
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS predictions (
                patient_id TEXT NOT NULL,
                time_interval INTEGER NOT NULL,
                tv_in_range_next INTEGER NOT NULL,
                etco2_in_range_next INTEGER NOT NULL,
                spo2_in_range_next INTEGER NOT NULL,
                pplat_in_range_next INTEGER NOT NULL,
                predicted_at TEXT NOT NULL,
                PRIMARY KEY (patient_id, time_interval),
                FOREIGN KEY (patient_id) REFERENCES patients(patient_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    // ===== Patients =====

    #[instrument(skip(self, patient), fields(patient_id = %patient.patient_id))]
    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO patients (
                patient_id, gender, age, height, weight,
                comorbid_nkmi, comorbid_dm, comorbid_hpt, comorbid_ihd,
                comorbid_ckd, comorbid_ba, comorbid_copd, comorbid_others,
                indication_intubation, gcs, fio2_prior, induction_agent,
                paralytic_agent, ett_size, stratified_lung_pathology, sedation,
                condition, min_tv, max_tv, min_etco2, max_etco2, min_spo2,
                max_spo2, max_pplat
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&patient.patient_id)
        .bind(&patient.gender)
        .bind(patient.age)
        .bind(patient.height)
        .bind(patient.weight)
        .bind(patient.comorbid_nkmi)
        .bind(patient.comorbid_dm)
        .bind(patient.comorbid_hpt)
        .bind(patient.comorbid_ihd)
        .bind(patient.comorbid_ckd)
        .bind(patient.comorbid_ba)
        .bind(patient.comorbid_copd)
        .bind(patient.comorbid_others)
        .bind(&patient.indication_intubation)
        .bind(patient.gcs)
        .bind(patient.fio2_prior)
        .bind(&patient.induction_agent)
        .bind(&patient.paralytic_agent)
        .bind(patient.ett_size)
        .bind(&patient.stratified_lung_pathology)
        .bind(&patient.sedation)
        .bind(&patient.condition)
        .bind(patient.min_tv)
        .bind(patient.max_tv)
        .bind(patient.min_etco2)
        .bind(patient.max_etco2)
        .bind(patient.min_spo2)
        .bind(patient.max_spo2)
        .bind(patient.max_pplat)
        .execute(&self.pool)
        .await?;

        debug!("patient upserted");
        Ok(())
    }

    async fn patient(&self, patient_id: &str) -> Result<Option<Patient>, StoreError> {
        let patient = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE patient_id = ?")
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    async fn patient_ids(&self) -> Result<Vec<String>, StoreError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT patient_id FROM patients ORDER BY patient_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    // ===== Ventilator settings =====

    #[instrument(skip(self, setting), fields(patient_id = %setting.patient_id, time = %setting.time_interval))]
    async fn upsert_vent_setting(&self, setting: &VentSetting) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO vent_settings (
                patient_id, time_interval, tv_setting, fio2, ventilator_rate,
                ie_ratio, peep, ps, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&setting.patient_id)
        .bind(i64::from(setting.time_interval))
        .bind(setting.tv_setting)
        .bind(setting.fio2)
        .bind(setting.ventilator_rate)
        .bind(&setting.ie_ratio)
        .bind(setting.peep)
        .bind(setting.ps)
        .bind(setting.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn vent_setting(&self, patient_id: &str, at: Interval) -> Result<Option<VentSetting>, StoreError> {
        let setting = sqlx::query_as::<_, VentSetting>(
            "SELECT * FROM vent_settings WHERE patient_id = ? AND time_interval = ?",
        )
        .bind(patient_id)
        .bind(i64::from(at))
        .fetch_optional(&self.pool)
        .await?;
        Ok(setting)
    }

    async fn latest_vent_setting(&self, patient_id: &str, at: Interval) -> Result<Option<VentSetting>, StoreError> {
        let setting = sqlx::query_as::<_, VentSetting>(
            "SELECT * FROM vent_settings
             WHERE patient_id = ? AND time_interval <= ?
             ORDER BY time_interval DESC
             LIMIT 1",
        )
        .bind(patient_id)
        .bind(i64::from(at))
        .fetch_optional(&self.pool)
        .await?;
        Ok(setting)
    }

    async fn vent_settings(&self, patient_id: &str) -> Result<Vec<VentSetting>, StoreError> {
        let settings = sqlx::query_as::<_, VentSetting>(
            "SELECT * FROM vent_settings WHERE patient_id = ? ORDER BY time_interval ASC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(settings)
    }

    // ===== Observed data =====

    #[instrument(skip(self, observed), fields(patient_id = %observed.patient_id, time = %observed.time_interval))]
    async fn upsert_observed(&self, observed: &ObservedData) -> Result<(), StoreError> {
        let r = &observed.readings;
        sqlx::query(
            "INSERT OR REPLACE INTO observed_data (
                patient_id, time_interval, generated_mv, ppeak, sbp, dbp, hr, rr,
                ph, po2, pco2, hco3, be, lactate, tv, etco2, spo2, pplat, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&observed.patient_id)
        .bind(i64::from(observed.time_interval))
        .bind(r.generated_mv)
        .bind(r.ppeak)
        .bind(r.sbp)
        .bind(r.dbp)
        .bind(r.hr)
        .bind(r.rr)
        .bind(r.ph)
        .bind(r.po2)
        .bind(r.pco2)
        .bind(r.hco3)
        .bind(r.be)
        .bind(r.lactate)
        .bind(r.tv)
        .bind(r.etco2)
        .bind(r.spo2)
        .bind(r.pplat)
        .bind(observed.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn observed(&self, patient_id: &str, at: Interval) -> Result<Option<ObservedData>, StoreError> {
        let observed = sqlx::query_as::<_, ObservedData>(
            "SELECT * FROM observed_data WHERE patient_id = ? AND time_interval = ?",
        )
        .bind(patient_id)
        .bind(i64::from(at))
        .fetch_optional(&self.pool)
        .await?;
        Ok(observed)
    }

    async fn observed_history(&self, patient_id: &str) -> Result<Vec<ObservedData>, StoreError> {
        let rows = sqlx::query_as::<_, ObservedData>(
            "SELECT * FROM observed_data WHERE patient_id = ? ORDER BY time_interval ASC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ===== Derived features =====

    #[instrument(skip(self, derived), fields(patient_id = %derived.patient_id, time = %derived.time_interval))]
    async fn upsert_derived(&self, derived: &DerivedFeature) -> Result<(), StoreError> {
        let d = derived;
        sqlx::query(
            "INSERT OR REPLACE INTO derived_features (
                patient_id, time_interval,
                tv_diff, tv_pct_change, etco2_diff, etco2_pct_change,
                spo2_diff, spo2_pct_change, pplat_diff, pplat_pct_change,
                tv_lag1, etco2_lag1, spo2_lag1, pplat_lag1, hr_lag1, rr_lag1,
                tv_dist_low, tv_dist_high, tv_dist_closest,
                etco2_dist_low, etco2_dist_high, etco2_dist_closest,
                spo2_dist_low, spo2_dist_high, spo2_dist_closest,
                pplat_dist_high, pplat_dist_closest,
                tv_in_range, etco2_in_range, spo2_in_range, pplat_in_range,
                ie_ratio_numeric
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&d.patient_id)
        .bind(i64::from(d.time_interval))
        .bind(d.tv_diff)
        .bind(d.tv_pct_change)
        .bind(d.etco2_diff)
        .bind(d.etco2_pct_change)
        .bind(d.spo2_diff)
        .bind(d.spo2_pct_change)
        .bind(d.pplat_diff)
        .bind(d.pplat_pct_change)
        .bind(d.tv_lag1)
        .bind(d.etco2_lag1)
        .bind(d.spo2_lag1)
        .bind(d.pplat_lag1)
        .bind(d.hr_lag1)
        .bind(d.rr_lag1)
        .bind(d.tv_dist_low)
        .bind(d.tv_dist_high)
        .bind(d.tv_dist_closest)
        .bind(d.etco2_dist_low)
        .bind(d.etco2_dist_high)
        .bind(d.etco2_dist_closest)
        .bind(d.spo2_dist_low)
        .bind(d.spo2_dist_high)
        .bind(d.spo2_dist_closest)
        .bind(d.pplat_dist_high)
        .bind(d.pplat_dist_closest)
        .bind(d.tv_in_range)
        .bind(d.etco2_in_range)
        .bind(d.spo2_in_range)
        .bind(d.pplat_in_range)
        .bind(d.ie_ratio_numeric)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn derived(&self, patient_id: &str, at: Interval) -> Result<Option<DerivedFeature>, StoreError> {
        let derived = sqlx::query_as::<_, DerivedFeature>(
            "SELECT * FROM derived_features WHERE patient_id = ? AND time_interval = ?",
        )
        .bind(patient_id)
        .bind(i64::from(at))
        .fetch_optional(&self.pool)
        .await?;
        Ok(derived)
    }

    // ===== Predictions =====

    #[instrument(skip(self, prediction), fields(patient_id = %prediction.patient_id, time = %prediction.time_interval))]
    async fn upsert_prediction(&self, prediction: &Prediction) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO predictions (
                patient_id, time_interval, tv_in_range_next, etco2_in_range_next,
                spo2_in_range_next, pplat_in_range_next, predicted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&prediction.patient_id)
        .bind(i64::from(prediction.time_interval))
        .bind(prediction.tv_in_range_next)
        .bind(prediction.etco2_in_range_next)
        .bind(prediction.spo2_in_range_next)
        .bind(prediction.pplat_in_range_next)
        .bind(prediction.predicted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn prediction(&self, patient_id: &str, at: Interval) -> Result<Option<Prediction>, StoreError> {
        let prediction = sqlx::query_as::<_, Prediction>(
            "SELECT * FROM predictions WHERE patient_id = ? AND time_interval = ?",
        )
        .bind(patient_id)
        .bind(i64::from(at))
        .fetch_optional(&self.pool)
        .await?;
        Ok(prediction)
    }

    async fn predictions(&self, patient_id: &str) -> Result<Vec<Prediction>, StoreError> {
        let rows = sqlx::query_as::<_, Prediction>(
            "SELECT * FROM predictions WHERE patient_id = ? ORDER BY time_interval ASC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::patient::fixtures::patient;
    use crate::models::ObservedReadings;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn observed(at: i64, tv: f64) -> ObservedData {
        let readings = ObservedReadings { tv: Some(tv), hr: Some(80.0), ..Default::default() };
        ObservedData::new("P001", Interval::new(at).unwrap(), readings)
    }

    #[tokio::test]
    async fn patient_upsert_replaces_targets() {
        let store = store().await;
        let mut p = patient("P001");
        store.upsert_patient(&p).await.unwrap();
        p.max_tv = Some(650.0);
        store.upsert_patient(&p).await.unwrap();

        let loaded = store.patient("P001").await.unwrap().unwrap();
        assert_eq!(loaded, p);
        assert_eq!(store.patient_ids().await.unwrap(), vec!["P001".to_string()]);
    }

    #[tokio::test]
    async fn observed_rows_come_back_in_time_order() {
        let store = store().await;
        store.upsert_patient(&patient("P001")).await.unwrap();
        for (at, tv) in [(30, 470.0), (0, 420.0), (15, 650.0)] {
            store.upsert_observed(&observed(at, tv)).await.unwrap();
        }

        let history = store.observed_history("P001").await.unwrap();
        let times: Vec<i64> = history.iter().map(|o| i64::from(o.time_interval)).collect();
        assert_eq!(times, vec![0, 15, 30]);
        assert_eq!(history[1].readings.tv, Some(650.0));
        assert_eq!(history[1].readings.spo2, None);
    }

    #[tokio::test]
    async fn missing_rows_are_none() {
        let store = store().await;
        assert!(store.patient("nobody").await.unwrap().is_none());
        assert!(store.derived("nobody", Interval::START).await.unwrap().is_none());
        assert!(store.predictions("nobody").await.unwrap().is_empty());
    }
}
