//! OTLP utility functions
//!
//! Provides reusable functions for working with OTLP metrics protobuf types:
//! - Resource attribute lookup (service name)
//! - Data point and metric counting

use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{Metric, metric::Data};
use opentelemetry_proto::tonic::resource::v1::Resource;

// ============================================================================
// SHARED ATTRIBUTE KEYS
// ============================================================================

/// Well-known resource attribute keys
pub mod keys {
    pub const SERVICE_NAME: &str = "service.name";
}

// ============================================================================
// ATTRIBUTE EXTRACTION
// ============================================================================

/// Look up a string-valued attribute by key.
///
/// Non-string values and empty strings are treated as absent.
pub fn get_string_attribute<'a>(attrs: &'a [KeyValue], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_ref())
        .and_then(|v| match &v.value {
            Some(any_value::Value::StringValue(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        })
}

/// Service name of a resource (`service.name` attribute)
pub fn get_service_name(resource: Option<&Resource>) -> Option<&str> {
    resource.and_then(|r| get_string_attribute(&r.attributes, keys::SERVICE_NAME))
}

// ============================================================================
// COUNTING
// ============================================================================

/// Number of data points carried by a single metric (all 5 OTLP metric types)
pub fn metric_data_point_count(metric: &Metric) -> usize {
    match &metric.data {
        Some(Data::Gauge(g)) => g.data_points.len(),
        Some(Data::Sum(s)) => s.data_points.len(),
        Some(Data::Histogram(h)) => h.data_points.len(),
        Some(Data::ExponentialHistogram(h)) => h.data_points.len(),
        Some(Data::Summary(s)) => s.data_points.len(),
        None => 0,
    }
}

/// Total number of data points across every resource and scope in a request
pub fn data_point_count(request: &ExportMetricsServiceRequest) -> usize {
    request
        .resource_metrics
        .iter()
        .flat_map(|rm| &rm.scope_metrics)
        .flat_map(|sm| &sm.metrics)
        .map(metric_data_point_count)
        .sum()
}

/// Total number of metric records in a request
pub fn metric_count(request: &ExportMetricsServiceRequest) -> usize {
    request
        .resource_metrics
        .iter()
        .flat_map(|rm| &rm.scope_metrics)
        .map(|sm| sm.metrics.len())
        .sum()
}
