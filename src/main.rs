//! Ventwatch
//!
//! Command-line and HTTP entry point for ventilation target prediction.

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

use ventwatch::config::{self, Config};
use ventwatch::core::{FeatureSchema, LinearClassifier};
use ventwatch::db::{MemoryStore, RecordStore, SqliteStore};
use ventwatch::models::{ObservedReadings, Patient};
use ventwatch::service::IntervalSubmission;
use ventwatch::{api, telemetry, VentilationService};

#[derive(Parser)]
#[command(name = "ventwatch", about = "Ventilation target prediction for ventilated patients")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Keep records in memory instead of the configured database.
    #[arg(long, global = true)]
    memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve,
    /// Register or update a patient from a JSON file.
    AddPatient { file: PathBuf },
    /// Chart one interval's ventilator settings and predict the next interval.
    Submit {
        patient_id: String,
        #[arg(long)]
        time: i64,
        #[arg(long)]
        tv_setting: f64,
        #[arg(long)]
        fio2: f64,
        #[arg(long)]
        rate: f64,
        #[arg(long)]
        ie_ratio: String,
        #[arg(long)]
        peep: f64,
        #[arg(long)]
        ps: f64,
        /// JSON file with charted readings; simulated when omitted.
        #[arg(long)]
        observed: Option<PathBuf>,
    },
    /// List registered patients.
    Patients,
    /// Print a patient's observed trend and predictions.
    Timeline { patient_id: String },
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = config::load_config().context("failed to load configuration")?;
    telemetry::init(&config.logging);

    let service = build_service(&config, cli.memory).await?;

    match cli.command {
        Commands::Serve => serve(config, service).await?,
        Commands::AddPatient { file } => {
            let patient: Patient = read_json(&file)?;
            let patient_id = patient.patient_id.clone();
            service.register_patient(patient).await?;
            println!("Patient {} saved.", patient_id);
        }
        Commands::Submit { patient_id, time, tv_setting, fio2, rate, ie_ratio, peep, ps, observed } => {
            let observed = observed.map(|path| read_json::<ObservedReadings>(&path)).transpose()?;
            let submission = IntervalSubmission {
                time_interval: time,
                tv_setting,
                fio2,
                ventilator_rate: rate,
                ie_ratio,
                peep,
                ps,
                observed,
            };
            let outcome = service.submit_interval(&patient_id, submission).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.derived)?);
            println!("{}", outcome.prediction.summary());
        }
        Commands::Patients => {
            for id in service.patients().await? {
                println!("{}", id);
            }
        }
        Commands::Timeline { patient_id } => {
            let timeline = service.timeline(&patient_id).await?;
            println!("{}", serde_json::to_string_pretty(&timeline)?);
        }
    }

    Ok(())
}

async fn build_service(config: &Config, memory: bool) -> Result<VentilationService> {
    let store: Arc<dyn RecordStore> = if memory {
        info!("using in-memory record store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            SqliteStore::connect(&config.database.url)
                .await
                .with_context(|| format!("failed to open {}", config.database.url))?,
        )
    };

    let schema = FeatureSchema::load(&config.model.feature_names_path)?;
    let classifier = LinearClassifier::load(&config.model.model_path)?;
    if classifier.feature_names() != schema.columns() {
        warn!("model feature list differs from {}; predictions will fail", config.model.feature_names_path);
    }

    Ok(VentilationService::new(store, schema, Arc::new(classifier)))
}

async fn serve(config: Config, service: VentilationService) -> Result<()> {
    let service = web::Data::new(service);
    let bind = (config.server.host.clone(), config.server.port);
    info!(host = %bind.0, port = bind.1, "starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(TracingLogger::default())
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
