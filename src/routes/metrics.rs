use axum::http::StatusCode;
use prometheus::{Encoder, TextEncoder};

use crate::services::metrics::INVITATIONS_ISSUED;

/// GET /metrics: Prometheus scrape endpoint, meant to stay behind the proxy.
pub async fn metrics_handler() -> Result<String, StatusCode> {
    // Touch one counter so the registry is populated before the first event.
    lazy_static::initialize(&INVITATIONS_ISSUED);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
