//! OpenTelemetry Protocol (OTLP) HTTP and gRPC metrics endpoints

pub mod encoding;
pub mod grpc;
mod metrics;

pub use encoding::{DecodeError, EncodeError, OtlpEncoding};
pub use grpc::OtlpMetricsService;

use std::sync::Arc;

use axum::Router;
use axum::routing::any;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::core::config::HttpConfig;
use crate::domain::metrics::MetricsExporter;

#[derive(Clone)]
pub struct OtlpState {
    pub exporter: Arc<MetricsExporter>,
    /// Maximum accepted request body, after decompression
    pub body_limit: usize,
}

pub fn routes(exporter: Arc<MetricsExporter>, config: &HttpConfig) -> Router {
    let state = OtlpState {
        exporter,
        body_limit: config.max_request_body_size,
    };

    Router::new()
        .route(&config.metrics_url_path, any(metrics::export))
        .fallback(metrics::fallback)
        .with_state(state)
        .layer(RequestDecompressionLayer::new().pass_through_unaccepted(true))
        .layer(TraceLayer::new_for_http())
}
