//! In-memory stand-ins for the record service's collaborators.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use record_service::cache::{CacheError, CacheResult, RecordCache};
use record_service::db::RecordRepository;
use record_service::degradation::{Degradation, DegradationObserver};
use record_service::kafka::{EventPublisher, KafkaError, RecordEvent, RecordEventHandler};
use record_service::models::{Record, Visibility};
use record_service::services::RecordService;
use record_service::{AppError, Result};

#[derive(Default)]
pub struct InMemoryRepository {
    records: Mutex<HashMap<Uuid, Record>>,
    fail: AtomicBool,
    get_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn raw(&self, id: Uuid) -> Option<Record> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::StorageFailure(
                "connection to server was lost".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordRepository for InMemoryRepository {
    async fn create(&self, content: &str) -> Result<Record> {
        self.check()?;

        let now = Utc::now();
        let record = Record {
            id: Uuid::new_v4(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());

        Ok(record)
    }

    async fn get(&self, id: Uuid, visibility: Visibility) -> Result<Record> {
        self.check()?;
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let records = self.records.lock().unwrap();
        match records.get(&id) {
            Some(record) if visibility == Visibility::IncludeDeleted || !record.is_deleted() => {
                Ok(record.clone())
            }
            _ => Err(AppError::NotFound(id)),
        }
    }

    async fn update(&self, id: Uuid, content: &str) -> Result<Record> {
        self.check()?;

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .filter(|r| !r.is_deleted())
            .ok_or(AppError::NotFound(id))?;

        let now = Utc::now();
        record.content = content.to_string();
        record.updated_at = if now > record.updated_at {
            now
        } else {
            record.updated_at + ChronoDuration::microseconds(1)
        };

        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.check()?;

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .filter(|r| !r.is_deleted())
            .ok_or(AppError::NotFound(id))?;
        record.deleted_at = Some(Utc::now());

        Ok(())
    }

    async fn purge(&self, id: Uuid) -> Result<()> {
        self.check()?;

        self.records
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::NotFound(id))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Record>, i64)> {
        self.check()?;

        let mut live: Vec<Record> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| !r.is_deleted())
            .cloned()
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = live.len() as i64;
        let page = live
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok((page, total))
    }
}

fn cache_down() -> CacheError {
    CacheError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection refused",
    )))
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<Uuid, Record>>,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_delete: AtomicBool,
}

impl InMemoryCache {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_everything(&self) {
        self.fail_reads(true);
        self.fail_writes(true);
        self.fail_deletes(true);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.lock().unwrap().contains_key(&id)
    }

    pub fn put(&self, record: Record) {
        self.entries.lock().unwrap().insert(record.id, record);
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[async_trait]
impl RecordCache for InMemoryCache {
    async fn set(&self, record: &Record, _ttl: Duration) -> CacheResult<()> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(cache_down());
        }
        self.put(record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CacheResult<Option<Record>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(cache_down());
        }
        Ok(self.entries.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> CacheResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(cache_down());
        }
        self.entries.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<RecordEvent>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<RecordEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &RecordEvent) -> std::result::Result<(), KafkaError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(KafkaError::PublishFailed {
                attempts: 5,
                message: "broker transport failure".to_string(),
            });
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    degradations: Mutex<Vec<Degradation>>,
}

impl RecordingObserver {
    pub fn degradations(&self) -> Vec<Degradation> {
        self.degradations.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<&'static str> {
        self.degradations().iter().map(Degradation::step).collect()
    }
}

impl DegradationObserver for RecordingObserver {
    fn degraded(&self, degradation: Degradation) {
        self.degradations.lock().unwrap().push(degradation);
    }
}

/// Collects handled events; fails for ids in `failing`
#[derive(Default)]
pub struct RecordingHandler {
    handled: Mutex<Vec<RecordEvent>>,
    failing: Mutex<Vec<Uuid>>,
}

impl RecordingHandler {
    pub fn fail_for(&self, id: Uuid) {
        self.failing.lock().unwrap().push(id);
    }

    pub fn handled(&self) -> Vec<RecordEvent> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordEventHandler for RecordingHandler {
    async fn handle(&self, event: RecordEvent) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().contains(&event.id) {
            anyhow::bail!("downstream rejected record {}", event.id);
        }
        self.handled.lock().unwrap().push(event);
        Ok(())
    }
}

/// Record service wired to in-memory collaborators
pub struct Harness {
    pub repo: Arc<InMemoryRepository>,
    pub cache: Arc<InMemoryCache>,
    pub publisher: Arc<RecordingPublisher>,
    pub observer: Arc<RecordingObserver>,
    pub service: RecordService,
}

impl Harness {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::default());
        let cache = Arc::new(InMemoryCache::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let observer = Arc::new(RecordingObserver::default());

        let service = RecordService::new(
            repo.clone(),
            cache.clone(),
            publisher.clone(),
            observer.clone(),
            Duration::from_secs(86_400),
        );

        Self {
            repo,
            cache,
            publisher,
            observer,
            service,
        }
    }
}
