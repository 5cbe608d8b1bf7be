//! HTTP API for Ventwatch
//!
//! JSON endpoints for patient registration, interval submission and the
//! per-patient dashboard timeline.

pub mod handlers;
pub mod routes;

pub use routes::configure;
