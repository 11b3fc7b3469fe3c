use actix_web::{web, App, HttpServer};
use anyhow::Context;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use record_service::cache::RedisRecordCache;
use record_service::consumers::LoggingRecordEventHandler;
use record_service::db::{self, PgRecordRepository};
use record_service::degradation::{DegradationObserver, TracingObserver};
use record_service::handlers::{self, HealthState};
use record_service::kafka::{
    create_producer, KafkaEventSink, RecordEventConsumer, RecordEventPublisher,
};
use record_service::metrics;
use record_service::services::RecordService;
use record_service::Config;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,record_service=debug,actix_web=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Record Service
///
/// # Routes
///
/// - `/api/v1/records` - Create and list records
/// - `/api/v1/records/{id}` - Read, update, soft-delete a record
/// - `/api/v1/health`, `/api/v1/health/live`, `/api/v1/health/ready` - Probes
/// - `/metrics` - Prometheus metrics
///
/// # Shutdown
///
/// SIGINT/SIGTERM stops the HTTP server, then signals the consumer group and
/// waits for every partition worker to return.
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()
        .map_err(anyhow::Error::msg)
        .context("Failed to load configuration")?;

    info!("Starting record-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    let db_pool = db::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");

    let redis_client =
        redis::Client::open(config.cache.url.as_str()).context("Invalid REDIS_URL")?;
    let redis = ConnectionManager::new(redis_client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis connection established");

    let producer = create_producer(&config.kafka).context("Failed to create Kafka producer")?;
    let publisher = RecordEventPublisher::new(
        KafkaEventSink::new(
            producer,
            Duration::from_millis(config.kafka.request_timeout_ms),
        ),
        config.kafka.topic.clone(),
        config.kafka.retry_config(),
    );

    let observer: Arc<dyn DegradationObserver> = Arc::new(TracingObserver);

    let record_service = web::Data::new(RecordService::new(
        Arc::new(PgRecordRepository::new(db_pool.clone())),
        Arc::new(RedisRecordCache::new(redis.clone(), config.cache.op_timeout())),
        Arc::new(publisher),
        observer.clone(),
        config.cache.ttl(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer_group = if config.consumer.enabled {
        let group = RecordEventConsumer::new(
            &config.kafka,
            config.consumer.clone(),
            Arc::new(LoggingRecordEventHandler),
            observer.clone(),
        )
        .start(shutdown_rx)
        .await
        .context("Failed to start record event consumer group")?;
        Some(group)
    } else {
        info!("Record event consumer group disabled");
        None
    };

    let health_state = web::Data::new(HealthState { db_pool, redis });

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    info!("HTTP server listening on {}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(record_service.clone())
            .app_data(health_state.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(handlers::configure_health)
            .configure(handlers::configure_records)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .disable_signals()
    .run();

    let server_handle = server.handle();
    let mut server_task = tokio::spawn(server);

    let mut first_error: Option<anyhow::Error> = None;

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => {
                    error!("HTTP server failed: {}", e);
                    first_error = Some(e.into());
                }
                Err(e) => {
                    error!("HTTP server task join error: {}", e);
                    first_error = Some(e.into());
                }
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            server_handle.stop(true).await;
            if let Err(e) = server_task.await {
                error!("HTTP server task join error: {}", e);
            }
        }
    }

    let _ = shutdown_tx.send(true);

    if let Some(group) = consumer_group {
        let stopped = group.join().await;
        info!(workers = stopped.len(), "Consumer group drained");
    }

    info!("Record-service shutting down");

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
