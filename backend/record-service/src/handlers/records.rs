/// Record handlers - HTTP endpoints for record operations
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::services::RecordService;

#[derive(Debug, Deserialize, Validate)]
pub struct RecordRequest {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListRecordsQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u32,
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

fn parse_record_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidInput(format!("invalid record id: {}", raw)))
}

/// Create a new record
pub async fn create_record(
    service: web::Data<RecordService>,
    req: web::Json<RecordRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    let record = service.create_record(&req.content).await?;

    Ok(HttpResponse::Created().json(record))
}

/// Get a record by ID
pub async fn get_record(
    service: web::Data<RecordService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = parse_record_id(&path)?;

    let record = service.get_record(id).await?;

    Ok(HttpResponse::Ok().json(record))
}

/// Replace a record's content
pub async fn update_record(
    service: web::Data<RecordService>,
    path: web::Path<String>,
    req: web::Json<RecordRequest>,
) -> Result<HttpResponse> {
    let id = parse_record_id(&path)?;
    req.validate()?;

    let record = service.update_record(id, &req.content).await?;

    Ok(HttpResponse::Ok().json(record))
}

/// Soft-delete a record
pub async fn delete_record(
    service: web::Data<RecordService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = parse_record_id(&path)?;

    service.delete_record(id).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// List live records, newest first
pub async fn list_records(
    service: web::Data<RecordService>,
    query: web::Query<ListRecordsQuery>,
) -> Result<HttpResponse> {
    query.validate()?;

    let page = service.list_records(query.page, query.page_size).await?;

    Ok(HttpResponse::Ok().json(page))
}
