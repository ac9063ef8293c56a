//! Metric redaction filter
//!
//! Copies a metrics batch, dropping every metric whose name is on the redaction list.
//! When a resource carries `service.name`, redaction entries for that resource are
//! compared as `<service.name>_<entry>`. Resource and scope groups are never pruned,
//! even when all of their metrics are dropped.

use std::borrow::Cow;

use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::{ResourceMetrics, ScopeMetrics};
use rustc_hash::FxHashSet;

use crate::utils::otlp::get_service_name;

/// Produce a filtered copy of `request`. The input is left untouched.
pub fn filter_metrics(
    request: &ExportMetricsServiceRequest,
    restricted_metrics: &[String],
) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: request
            .resource_metrics
            .iter()
            .map(|rm| filter_resource(rm, restricted_metrics))
            .collect(),
    }
}

/// Redaction names in effect for one resource group
fn redacted_names<'a>(
    service_name: Option<&str>,
    restricted_metrics: &'a [String],
) -> FxHashSet<Cow<'a, str>> {
    restricted_metrics
        .iter()
        .map(|entry| match service_name {
            Some(service) => format!("{}_{}", service, entry).into(),
            None => entry.as_str().into(),
        })
        .collect()
}

fn filter_resource(rm: &ResourceMetrics, restricted_metrics: &[String]) -> ResourceMetrics {
    let service_name = get_service_name(rm.resource.as_ref());
    let redacted = redacted_names(service_name, restricted_metrics);

    ResourceMetrics {
        resource: rm.resource.clone(),
        scope_metrics: rm
            .scope_metrics
            .iter()
            .map(|sm| filter_scope(sm, &redacted))
            .collect(),
        schema_url: rm.schema_url.clone(),
    }
}

fn filter_scope(sm: &ScopeMetrics, redacted: &FxHashSet<Cow<'_, str>>) -> ScopeMetrics {
    let metrics = sm
        .metrics
        .iter()
        .filter(|metric| {
            if redacted.contains(metric.name.as_str()) {
                tracing::trace!(name = %metric.name, "Redacting metric");
                false
            } else {
                tracing::trace!(name = %metric.name, "Forwarding metric");
                true
            }
        })
        .cloned()
        .collect();

    ScopeMetrics {
        scope: sm.scope.clone(),
        metrics,
        schema_url: sm.schema_url.clone(),
    }
}
