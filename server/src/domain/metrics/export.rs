//! Protocol-agnostic metrics export
//!
//! Shared by the HTTP and gRPC adapters: skip empty batches, redact, forward to the
//! downstream consumer, translate failures into a `StatusError`.

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};

use super::consumer::{ConsumerError, MetricsConsumer};
use super::filter::filter_metrics;
use super::obsreport::{MetricsOp, Transport};
use crate::domain::status::{StatusError, status_from_error};
use crate::utils::otlp::data_point_count;

pub struct MetricsExporter {
    consumer: Arc<dyn MetricsConsumer>,
    restricted_metrics: Arc<[String]>,
}

impl MetricsExporter {
    pub fn new(consumer: Arc<dyn MetricsConsumer>, restricted_metrics: Arc<[String]>) -> Self {
        Self {
            consumer,
            restricted_metrics,
        }
    }

    pub fn restricted_metrics(&self) -> &[String] {
        &self.restricted_metrics
    }

    /// Export one batch. `format` labels the wire encoding for observability.
    pub async fn export(
        &self,
        request: ExportMetricsServiceRequest,
        transport: Transport,
        format: &'static str,
    ) -> Result<ExportMetricsServiceResponse, StatusError> {
        let data_points = data_point_count(&request);
        if data_points == 0 {
            return Ok(empty_response());
        }

        let op = MetricsOp::start(transport, format, data_points);
        let filtered = filter_metrics(&request, &self.restricted_metrics);
        let result = self.consumer.consume_metrics(filtered).await;
        op.end(result.as_ref().err());

        match result {
            Ok(()) => Ok(empty_response()),
            Err(e) => Err(status_from_error(&e, ConsumerError::is_permanent)),
        }
    }
}

#[inline]
fn empty_response() -> ExportMetricsServiceResponse {
    ExportMetricsServiceResponse {
        partial_success: None,
    }
}
