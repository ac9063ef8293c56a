//! Test doubles shared by the export handler and transport adapter tests

use std::time::Duration;

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{
    Gauge, Metric, NumberDataPoint, ResourceMetrics, ScopeMetrics, metric::Data, number_data_point,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use parking_lot::Mutex;

use super::consumer::{ConsumerError, MetricsConsumer};

/// Consumer that records every batch and replies with a fixed outcome
#[derive(Default)]
pub struct RecordingConsumer {
    pub batches: Mutex<Vec<ExportMetricsServiceRequest>>,
    pub error: Option<ConsumerError>,
    /// Sleep before recording, to keep requests in flight
    pub delay: Option<Duration>,
}

impl RecordingConsumer {
    pub fn failing(error: ConsumerError) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            error: Some(error),
            delay: None,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl MetricsConsumer for RecordingConsumer {
    async fn consume_metrics(
        &self,
        metrics: ExportMetricsServiceRequest,
    ) -> Result<(), ConsumerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.batches.lock().push(metrics);
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// One resource with an optional service name and a single scope of one-point gauges
pub fn make_request(
    service_name: Option<&str>,
    metric_names: &[&str],
) -> ExportMetricsServiceRequest {
    let attributes = service_name
        .map(|s| {
            vec![KeyValue {
                key: "service.name".to_string(),
                value: Some(AnyValue {
                    value: Some(any_value::Value::StringValue(s.to_string())),
                }),
            }]
        })
        .unwrap_or_default();

    let metrics = metric_names
        .iter()
        .map(|name| Metric {
            name: name.to_string(),
            data: Some(Data::Gauge(Gauge {
                data_points: vec![NumberDataPoint {
                    time_unix_nano: 1_700_000_000_000_000_000,
                    value: Some(number_data_point::Value::AsDouble(0.5)),
                    ..Default::default()
                }],
            })),
            ..Default::default()
        })
        .collect();

    ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: Some(Resource {
                attributes,
                dropped_attributes_count: 0,
            }),
            scope_metrics: vec![ScopeMetrics {
                scope: None,
                metrics,
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }],
    }
}
