/// Record service - sequences repository, cache and publisher per operation
///
/// The repository is the only fatal dependency. Cache and publisher failures
/// are handed to the `DegradationObserver` and the operation carries on.
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::cache::RecordCache;
use crate::db::RecordRepository;
use crate::degradation::{Degradation, DegradationObserver};
use crate::error::{AppError, Result};
use crate::kafka::{EventKind, EventPublisher, KafkaError, RecordEvent};
use crate::models::{Record, RecordPage, Visibility, MAX_CONTENT_LEN, MAX_PAGE_SIZE};

pub struct RecordService {
    repo: Arc<dyn RecordRepository>,
    cache: Arc<dyn RecordCache>,
    publisher: Arc<dyn EventPublisher>,
    observer: Arc<dyn DegradationObserver>,
    cache_ttl: Duration,
}

impl RecordService {
    pub fn new(
        repo: Arc<dyn RecordRepository>,
        cache: Arc<dyn RecordCache>,
        publisher: Arc<dyn EventPublisher>,
        observer: Arc<dyn DegradationObserver>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            publisher,
            observer,
            cache_ttl,
        }
    }

    /// Create a record, then cache it and announce it
    pub async fn create_record(&self, content: &str) -> Result<Record> {
        validate_content(content)?;

        let record = self.repo.create(content).await?;

        self.cache_record(&record).await;
        self.publish(RecordEvent::from_record(&record, EventKind::Created))
            .await;

        Ok(record)
    }

    /// Cache first; on a miss read the repository and repopulate
    pub async fn get_record(&self, id: Uuid) -> Result<Record> {
        match self.cache.get(id).await {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(err) => self.observer.degraded(Degradation::CacheRead {
                record_id: id,
                error: err.to_string(),
            }),
        }

        let record = self.repo.get(id, Visibility::Live).await?;
        self.cache_record(&record).await;

        Ok(record)
    }

    pub async fn update_record(&self, id: Uuid, content: &str) -> Result<Record> {
        validate_content(content)?;

        let record = self.repo.update(id, content).await?;

        self.cache_record(&record).await;
        self.publish(RecordEvent::from_record(&record, EventKind::Updated))
            .await;

        Ok(record)
    }

    /// Soft delete, invalidate the cached copy, announce the id
    pub async fn delete_record(&self, id: Uuid) -> Result<()> {
        self.repo.delete(id).await?;

        if let Err(err) = self.cache.delete(id).await {
            self.observer.degraded(Degradation::CacheInvalidate {
                record_id: id,
                error: err.to_string(),
            });
        }

        self.publish(RecordEvent::deleted(id)).await;

        Ok(())
    }

    /// Live records newest first; `page` is 1-based
    pub async fn list_records(&self, page: u32, page_size: u32) -> Result<RecordPage> {
        if page < 1 {
            return Err(AppError::InvalidInput("page must be >= 1".to_string()));
        }
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(AppError::InvalidInput(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let limit = i64::from(page_size);
        let offset = i64::from(page - 1) * limit;

        let (records, total) = self.repo.list(limit, offset).await?;

        Ok(RecordPage {
            records,
            total,
            page,
            page_size,
        })
    }

    async fn cache_record(&self, record: &Record) {
        if let Err(err) = self.cache.set(record, self.cache_ttl).await {
            self.observer.degraded(Degradation::CacheWrite {
                record_id: record.id,
                error: err.to_string(),
            });
        }
    }

    async fn publish(&self, event: RecordEvent) {
        match self.publisher.publish(&event).await {
            Ok(()) => debug!(
                record_id = %event.id,
                event_type = event.event_type.as_str(),
                "Record event published"
            ),
            Err(err) => {
                let attempts = match &err {
                    KafkaError::PublishFailed { attempts, .. } => *attempts,
                    _ => 1,
                };
                self.observer.degraded(Degradation::Publish {
                    record_id: event.id,
                    kind: event.event_type,
                    attempts,
                    error: err.to_string(),
                });
            }
        }
    }
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AppError::InvalidInput("content must not be empty".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(AppError::InvalidInput(format!(
            "content must be at most {} characters",
            MAX_CONTENT_LEN
        )));
    }
    Ok(())
}
