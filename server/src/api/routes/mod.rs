//! API route handlers

pub mod otlp_collector;
