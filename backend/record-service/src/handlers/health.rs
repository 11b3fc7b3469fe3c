use actix_web::{web, HttpResponse, Responder};
use redis::aio::ConnectionManager;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Instant;

/// Connections probed by the readiness check
#[derive(Clone)]
pub struct HealthState {
    pub db_pool: PgPool,
    pub redis: ConnectionManager,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    latency_ms: u64,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    checks: HashMap<&'static str, ComponentCheck>,
    timestamp: String,
}

/// Basic health check
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "record-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}

/// Readiness: PostgreSQL and Redis must both answer.
///
/// Returns 200 when both are reachable, 503 otherwise. Kafka is not probed;
/// publishing is best-effort and never blocks a request.
pub async fn readiness_check(state: web::Data<HealthState>) -> impl Responder {
    let mut checks = HashMap::new();

    let start = Instant::now();
    let pg_check = match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => healthy("PostgreSQL connection successful", start),
        Err(e) => unhealthy(format!("PostgreSQL connection failed: {}", e), start),
    };
    checks.insert("postgresql", pg_check);

    let start = Instant::now();
    let mut conn = state.redis.clone();
    let redis_check = match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
        Ok(_) => healthy("Redis PING successful", start),
        Err(e) => unhealthy(format!("Redis PING failed: {}", e), start),
    };
    checks.insert("redis", redis_check);

    let ready = checks
        .values()
        .all(|check| check.status == ComponentStatus::Healthy);
    let response = ReadinessResponse {
        ready,
        checks,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

fn healthy(message: &str, start: Instant) -> ComponentCheck {
    ComponentCheck {
        status: ComponentStatus::Healthy,
        message: message.to_string(),
        latency_ms: start.elapsed().as_millis() as u64,
    }
}

fn unhealthy(message: String, start: Instant) -> ComponentCheck {
    ComponentCheck {
        status: ComponentStatus::Unhealthy,
        message,
        latency_ms: start.elapsed().as_millis() as u64,
    }
}
