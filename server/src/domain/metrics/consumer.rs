//! Downstream consumer interface
//!
//! The receiver hands every filtered batch to exactly one `MetricsConsumer`.

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use thiserror::Error;

use crate::domain::status::StatusError;
use crate::utils::otlp::{data_point_count, metric_count};

#[derive(Debug, Clone, Error)]
pub enum ConsumerError {
    /// Failure that already carries a status code
    #[error("{0}")]
    Status(#[from] StatusError),

    /// The data itself was rejected; retrying the same batch cannot succeed
    #[error("{0}")]
    Permanent(String),

    /// Temporary failure; the caller may retry
    #[error("{0}")]
    Transient(String),
}

impl ConsumerError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

#[async_trait]
pub trait MetricsConsumer: Send + Sync {
    async fn consume_metrics(
        &self,
        metrics: ExportMetricsServiceRequest,
    ) -> Result<(), ConsumerError>;
}

/// Debug consumer: logs a summary of every batch, the full payload at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogConsumer;

#[async_trait]
impl MetricsConsumer for LogConsumer {
    async fn consume_metrics(
        &self,
        metrics: ExportMetricsServiceRequest,
    ) -> Result<(), ConsumerError> {
        tracing::info!(
            resources = metrics.resource_metrics.len(),
            metrics = metric_count(&metrics),
            data_points = data_point_count(&metrics),
            "Metrics batch received"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            match serde_json::to_string(&metrics) {
                Ok(json) => tracing::trace!(metrics = %json, "Metrics batch payload"),
                Err(e) => tracing::trace!(error = %e, "Failed to serialize metrics batch"),
            }
        }
        Ok(())
    }
}
