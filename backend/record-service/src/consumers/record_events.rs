use async_trait::async_trait;
use tracing::info;

use crate::kafka::consumer::RecordEventHandler;
use crate::kafka::events::{EventKind, RecordEvent};

/// Default callback: records each event in the service log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRecordEventHandler;

#[async_trait]
impl RecordEventHandler for LoggingRecordEventHandler {
    async fn handle(&self, event: RecordEvent) -> anyhow::Result<()> {
        match event.event_type {
            EventKind::Created | EventKind::Updated => {
                info!(
                    record_id = %event.id,
                    event_type = event.event_type.as_str(),
                    content_len = event.content.as_deref().map(str::len).unwrap_or(0),
                    updated_at = ?event.updated_at,
                    "Received record event"
                );
            }
            EventKind::Deleted => {
                info!(record_id = %event.id, "Received record deletion event");
            }
        }

        Ok(())
    }
}
