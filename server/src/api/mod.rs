//! OTLP receiver: transports, routes and lifecycle

pub mod routes;
mod server;

pub use routes::otlp_collector::{OtlpEncoding, OtlpMetricsService};
pub use server::{OtlpReceiver, ReceiverError, ReceiverState};
