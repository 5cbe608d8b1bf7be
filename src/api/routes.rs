use actix_web::web;

use super::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/patients", web::get().to(handlers::list_patients))
            .route("/patients", web::post().to(handlers::register_patient))
            .route("/patients/{patient_id}/intervals", web::post().to(handlers::submit_interval))
            .route("/patients/{patient_id}/timeline", web::get().to(handlers::timeline)),
    );
}
