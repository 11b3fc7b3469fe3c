//! Prometheus metrics for record-service.

use actix_web::HttpResponse;
use prometheus::{Encoder, TextEncoder};

pub mod records;

/// Encode the record-service registry in the text exposition format
pub fn render() -> prometheus::Result<Vec<u8>> {
    records::init();

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&records::REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

pub async fn serve_metrics() -> HttpResponse {
    match render() {
        Ok(body) => HttpResponse::Ok()
            .content_type(TextEncoder::new().format_type())
            .body(body),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::records::*;
    use super::*;

    #[test]
    fn test_render_lists_updated_families() {
        RECORD_CACHE_EVENTS.with_label_values(&["hit"]).inc();
        RECORD_PUBLISH_ATTEMPTS.observe(1.0);

        let text = String::from_utf8(render().unwrap()).unwrap();

        assert!(text.contains("record_cache_events_total{event=\"hit\"}"));
        assert!(text.contains("record_publish_attempts_bucket"));
    }

    #[test]
    fn test_collectors_stay_out_of_default_registry() {
        RECORD_DEGRADATIONS_TOTAL
            .with_label_values(&["cache_read"])
            .inc();

        let default_names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(!default_names.contains(&"record_degradations_total".to_string()));
    }
}
