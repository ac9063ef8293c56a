//! Per-export observability records

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::consumer::ConsumerError;

/// Wire transport an export arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Grpc,
    Http,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Grpc => "grpc",
            Transport::Http => "http",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-flight export operation. Created before the batch is forwarded and
/// closed with the downstream outcome.
#[derive(Debug)]
pub struct MetricsOp {
    transport: Transport,
    format: &'static str,
    data_points: usize,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl MetricsOp {
    pub fn start(transport: Transport, format: &'static str, data_points: usize) -> Self {
        let op = Self {
            transport,
            format,
            data_points,
            started_at: Utc::now(),
            started: Instant::now(),
        };
        tracing::trace!(
            transport = %op.transport,
            format = op.format,
            data_points = op.data_points,
            "Metrics export started"
        );
        op
    }

    pub fn end(self, error: Option<&ConsumerError>) {
        let duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let started_at = self.started_at.to_rfc3339();
        match error {
            None => tracing::debug!(
                transport = %self.transport,
                format = self.format,
                accepted_data_points = self.data_points,
                refused_data_points = 0,
                started_at,
                duration_ms,
                "Metrics export finished"
            ),
            Some(err) => tracing::warn!(
                transport = %self.transport,
                format = self.format,
                accepted_data_points = 0,
                refused_data_points = self.data_points,
                started_at,
                duration_ms,
                error = %err,
                "Metrics export refused by downstream consumer"
            ),
        }
    }
}
