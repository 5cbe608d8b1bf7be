use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;

use crate::error::{PipelineError, SubmissionError};
use crate::models::Patient;
use crate::service::{IntervalSubmission, VentilationService};

/// Submission error rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(SubmissionError);

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        ApiError(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            SubmissionError::Validation(_) => StatusCode::BAD_REQUEST,
            SubmissionError::Duplicate { .. } => StatusCode::CONFLICT,
            SubmissionError::Pipeline(PipelineError::Lookup(_)) => StatusCode::NOT_FOUND,
            SubmissionError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.0.to_string() }))
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn list_patients(service: web::Data<VentilationService>) -> Result<HttpResponse, ApiError> {
    let ids = service.patients().await?;
    Ok(HttpResponse::Ok().json(json!({ "count": ids.len(), "patients": ids })))
}

pub async fn register_patient(
    service: web::Data<VentilationService>,
    patient: web::Json<Patient>,
) -> Result<HttpResponse, ApiError> {
    let patient = patient.into_inner();
    let patient_id = patient.patient_id.clone();
    service.register_patient(patient).await?;
    Ok(HttpResponse::Created().json(json!({ "patient_id": patient_id })))
}

pub async fn submit_interval(
    service: web::Data<VentilationService>,
    path: web::Path<String>,
    submission: web::Json<IntervalSubmission>,
) -> Result<HttpResponse, ApiError> {
    let outcome = service.submit_interval(&path, submission.into_inner()).await?;
    let summary = outcome.prediction.summary();
    Ok(HttpResponse::Created().json(json!({ "summary": summary, "outcome": outcome })))
}

pub async fn timeline(
    service: web::Data<VentilationService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let timeline = service.timeline(&path).await?;
    Ok(HttpResponse::Ok().json(timeline))
}
