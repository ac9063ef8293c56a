//! Domain logic for the metrics gateway
//!
//! - `metrics` - redaction filter, export handler, downstream consumer interface
//! - `status` - transport-neutral status codes and their HTTP/gRPC translations

pub mod metrics;
pub mod status;

pub use metrics::{ConsumerError, LogConsumer, MetricsConsumer, MetricsExporter, Transport};
pub use status::{Code, StatusError};
