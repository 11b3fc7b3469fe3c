/// HTTP handlers for record-service
///
/// - Records: create, read, update, delete and list
/// - Health: liveness and readiness probes
pub mod health;
pub mod records;

use actix_web::web;

pub use health::{health_check, liveness_check, readiness_check, HealthState};
pub use records::{create_record, delete_record, get_record, list_records, update_record};

/// Register the record routes under `/api/v1/records`
pub fn configure_records(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/records")
            .route("", web::post().to(create_record))
            .route("", web::get().to(list_records))
            .route("/{id}", web::get().to(get_record))
            .route("/{id}", web::put().to(update_record))
            .route("/{id}", web::delete().to(delete_record)),
    );
}

/// Register the probes under `/api/v1/health`
pub fn configure_health(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/health")
            .route("", web::get().to(health_check))
            .route("/live", web::get().to(liveness_check))
            .route("/ready", web::get().to(readiness_check)),
    );
}
