/// Processing callbacks plugged into the record event consumer group
pub mod record_events;

pub use record_events::LoggingRecordEventHandler;
