//! Downstream delivery
//!
//! - `otlp_http` - forwards filtered batches to an OTLP/HTTP collector

pub mod otlp_http;

pub use otlp_http::OtlpHttpForwarder;
