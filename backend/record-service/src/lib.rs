/// Record Service Library
///
/// Keeps a durable record, its cache-aside copy and the downstream Kafka event
/// stream consistent under concurrent create/update/delete, and runs the
/// partition-per-worker consumer group that processes the resulting events.
///
/// # Modules
///
/// - `services`: Record orchestration (repository, then cache, then publisher)
/// - `db`: PostgreSQL pool and record repository
/// - `cache`: Redis cache-aside layer for record snapshots
/// - `kafka`: Event wire format, publisher, topic provisioning, consumer group
/// - `consumers`: Processing callbacks for consumed record events
/// - `degradation`: Non-fatal failure channel for best-effort steps
/// - `handlers`: Thin HTTP adapter over the record service
/// - `metrics`: Prometheus collectors and the `/metrics` endpoint
/// - `config`: Configuration management
/// - `error`: Error types and handling
pub mod cache;
pub mod config;
pub mod consumers;
pub mod db;
pub mod degradation;
pub mod error;
pub mod handlers;
pub mod kafka;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
