/// Business logic layer for record-service
///
/// - Record service: create/get/update/delete/list with cache-aside reads
///   and best-effort event publication
pub mod records;

pub use records::RecordService;
