//! Metrics Export Pipeline
//!
//! Receives OTLP metrics batches from either transport, drops redacted metrics,
//! and forwards the filtered copy to the downstream consumer.

mod consumer;
mod export;
mod filter;
mod obsreport;
#[cfg(test)]
pub(crate) mod testing;

pub use consumer::{ConsumerError, LogConsumer, MetricsConsumer};
pub use export::MetricsExporter;
pub use filter::filter_metrics;
pub use obsreport::{MetricsOp, Transport};
