// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths, identifiers and log targets)
pub const APP_NAME_LOWER: &str = "metricgate";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "metricgate.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "METRICGATE_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "METRICGATE_LOG";

// =============================================================================
// Environment Variables - Protocols
// =============================================================================

pub const ENV_GRPC_ENABLED: &str = "METRICGATE_GRPC";
pub const ENV_GRPC_ENDPOINT: &str = "METRICGATE_GRPC_ENDPOINT";
pub const ENV_HTTP_ENABLED: &str = "METRICGATE_HTTP";
pub const ENV_HTTP_ENDPOINT: &str = "METRICGATE_HTTP_ENDPOINT";
pub const ENV_METRICS_PATH: &str = "METRICGATE_METRICS_PATH";

// =============================================================================
// Environment Variables - Pipeline
// =============================================================================

/// Comma-separated redaction list
pub const ENV_RESTRICTED_METRICS: &str = "METRICGATE_RESTRICTED_METRICS";

/// Downstream OTLP/HTTP endpoint; batches are logged when unset
pub const ENV_FORWARD_ENDPOINT: &str = "METRICGATE_FORWARD_ENDPOINT";

// =============================================================================
// Protocol Defaults
// =============================================================================

/// Default OTLP gRPC port
pub const DEFAULT_GRPC_PORT: u16 = 4317;

/// Default OTLP HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 4318;

/// Default HTTP path for metrics export
pub const DEFAULT_METRICS_URL_PATH: &str = "/v1/metrics";

/// Default maximum inbound message size (MiB)
pub const DEFAULT_MAX_RECV_MSG_SIZE_MIB: u64 = 4;

/// Default downstream request timeout (seconds)
pub const DEFAULT_FORWARD_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Wire Formats
// =============================================================================

pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Body written when an error status cannot be encoded in the negotiated format
pub const FALLBACK_ERROR_BODY: &str = r#"{"code": 13, "message": "failed to marshal error message"}"#;

/// Message carried by the status returned for unmatched HTTP routes
pub const NOT_FOUND_MESSAGE: &str = "404 page not found";

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for the receiver to drain on shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
