use std::fmt;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_FORWARD_TIMEOUT_SECS, DEFAULT_GRPC_PORT, DEFAULT_HTTP_PORT,
    DEFAULT_MAX_RECV_MSG_SIZE_MIB, DEFAULT_METRICS_URL_PATH,
};

const MIB: u64 = 1024 * 1024;

// =============================================================================
// File Configuration (JSON)
// =============================================================================

/// gRPC receiver section (nested under protocols)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct GrpcFileConfig {
    pub endpoint: Option<String>,
    pub max_recv_msg_size_mib: Option<u64>,
}

/// HTTP receiver section (nested under protocols)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct HttpFileConfig {
    pub endpoint: Option<String>,
    pub metrics_url_path: Option<String>,
}

/// Receiver protocols. A protocol missing from this section is disabled.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProtocolsFileConfig {
    pub grpc: Option<GrpcFileConfig>,
    pub http: Option<HttpFileConfig>,
}

/// Downstream forwarding section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ForwardFileConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub protocols: Option<ProtocolsFileConfig>,
    pub restricted_metrics: Option<Vec<String>>,
    pub forward: Option<ForwardFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcConfig {
    pub endpoint: SocketAddr,
    /// Maximum decoded message size in bytes
    pub max_recv_msg_size: usize,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            endpoint: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_GRPC_PORT)),
            max_recv_msg_size: (DEFAULT_MAX_RECV_MSG_SIZE_MIB * MIB) as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub endpoint: SocketAddr,
    pub metrics_url_path: String,
    /// Maximum request body in bytes, measured after decompression
    pub max_request_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_HTTP_PORT)),
            metrics_url_path: DEFAULT_METRICS_URL_PATH.to_string(),
            max_request_body_size: (DEFAULT_MAX_RECV_MSG_SIZE_MIB * MIB) as usize,
        }
    }
}

/// Enabled receiver transports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolsConfig {
    pub grpc: Option<GrpcConfig>,
    pub http: Option<HttpConfig>,
}

impl Default for ProtocolsConfig {
    fn default() -> Self {
        Self {
            grpc: Some(GrpcConfig::default()),
            http: Some(HttpConfig::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub protocols: ProtocolsConfig,
    pub restricted_metrics: Vec<String>,
    /// Downstream collector; batches are logged when absent
    pub forward: Option<ForwardConfig>,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        // 1. Load from CLI-specified path OR local directory
        let path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        let file_config = match path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                tracing::debug!(path = %path.display(), "Config file loaded");
                config
            }
            None => FileConfig::default(),
        };

        let config = Self::from_sources(cli, file_config)?;
        config.validate()?;

        tracing::debug!(config = ?config, "Configuration loaded");
        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn from_sources(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        // Without a protocols section both receivers run with defaults
        let (file_grpc, file_http) = match file_config.protocols {
            Some(protocols) => (protocols.grpc, protocols.http),
            None => (
                Some(GrpcFileConfig::default()),
                Some(HttpFileConfig::default()),
            ),
        };

        let grpc_enabled = cli.grpc.unwrap_or(file_grpc.is_some());
        let http_enabled = cli.http.unwrap_or(file_http.is_some());
        let file_grpc = file_grpc.unwrap_or_default();
        let file_http = file_http.unwrap_or_default();

        let max_recv_msg_size_mib = file_grpc
            .max_recv_msg_size_mib
            .unwrap_or(DEFAULT_MAX_RECV_MSG_SIZE_MIB);
        let max_recv_msg_size = usize::try_from(max_recv_msg_size_mib.saturating_mul(MIB))
            .context("Configuration error: protocols.grpc.max_recv_msg_size_mib is too large")?;

        let grpc = if grpc_enabled {
            let endpoint = match cli.grpc_endpoint.as_deref().or(file_grpc.endpoint.as_deref()) {
                Some(value) => resolve_endpoint("protocols.grpc.endpoint", value)?,
                None => GrpcConfig::default().endpoint,
            };
            Some(GrpcConfig {
                endpoint,
                max_recv_msg_size,
            })
        } else {
            None
        };

        let http = if http_enabled {
            let endpoint = match cli.http_endpoint.as_deref().or(file_http.endpoint.as_deref()) {
                Some(value) => resolve_endpoint("protocols.http.endpoint", value)?,
                None => HttpConfig::default().endpoint,
            };
            let metrics_url_path = cli
                .metrics_path
                .clone()
                .or(file_http.metrics_url_path)
                .unwrap_or_else(|| DEFAULT_METRICS_URL_PATH.to_string());
            Some(HttpConfig {
                endpoint,
                metrics_url_path,
                max_request_body_size: max_recv_msg_size,
            })
        } else {
            None
        };

        // restricted_metrics: CLI/env list replaces the file list
        let restricted_metrics = if cli.restricted_metrics.is_empty() {
            file_config.restricted_metrics.unwrap_or_default()
        } else {
            cli.restricted_metrics.clone()
        };
        let restricted_metrics = restricted_metrics
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let file_forward = file_config.forward.unwrap_or_default();
        let forward = cli
            .forward_endpoint
            .clone()
            .or(file_forward.endpoint)
            .map(|endpoint| ForwardConfig {
                endpoint,
                timeout: Duration::from_secs(
                    file_forward
                        .timeout_secs
                        .unwrap_or(DEFAULT_FORWARD_TIMEOUT_SECS),
                ),
            });

        Ok(Self {
            protocols: ProtocolsConfig { grpc, http },
            restricted_metrics,
            forward,
        })
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        let ProtocolsConfig { grpc, http } = &self.protocols;

        if grpc.is_none() && http.is_none() {
            anyhow::bail!(
                "Configuration error: at least one of protocols.grpc or protocols.http must be enabled"
            );
        }

        if let Some(grpc) = grpc
            && grpc.max_recv_msg_size == 0
        {
            anyhow::bail!(
                "Configuration error: protocols.grpc.max_recv_msg_size_mib must be greater than 0"
            );
        }

        if let Some(http) = http {
            if !http.metrics_url_path.starts_with('/') {
                anyhow::bail!(
                    "Configuration error: protocols.http.metrics_url_path must start with '/' (got '{}')",
                    http.metrics_url_path
                );
            }
            if !is_literal_route_path(&http.metrics_url_path) {
                anyhow::bail!(
                    "Configuration error: protocols.http.metrics_url_path must be a literal path without '{{', '}}', '*' or ':'-prefixed segments (got '{}')",
                    http.metrics_url_path
                );
            }
            if http.max_request_body_size == 0 {
                anyhow::bail!(
                    "Configuration error: protocols.grpc.max_recv_msg_size_mib must be greater than 0"
                );
            }
        }

        // Endpoint collision check (port 0 asks the OS for distinct ports)
        if let (Some(grpc), Some(http)) = (grpc, http)
            && grpc.endpoint == http.endpoint
            && grpc.endpoint.port() != 0
        {
            anyhow::bail!(
                "Configuration error: protocols.grpc.endpoint ({}) and protocols.http.endpoint ({}) cannot be the same",
                grpc.endpoint,
                http.endpoint
            );
        }

        if let Some(forward) = &self.forward {
            if !(forward.endpoint.starts_with("http://") || forward.endpoint.starts_with("https://"))
            {
                anyhow::bail!(
                    "Configuration error: forward.endpoint must be an http:// or https:// URL (got '{}')",
                    forward.endpoint
                );
            }
            if forward.timeout.is_zero() {
                anyhow::bail!("Configuration error: forward.timeout_secs must be greater than 0");
            }
        }

        Ok(())
    }
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.protocols.grpc {
            Some(grpc) => writeln!(
                f,
                "grpc:    {} (max message {} bytes)",
                grpc.endpoint, grpc.max_recv_msg_size
            )?,
            None => writeln!(f, "grpc:    disabled")?,
        }
        match &self.protocols.http {
            Some(http) => writeln!(f, "http:    {}{}", http.endpoint, http.metrics_url_path)?,
            None => writeln!(f, "http:    disabled")?,
        }
        if self.restricted_metrics.is_empty() {
            writeln!(f, "redact:  (none)")?;
        } else {
            writeln!(f, "redact:  {}", self.restricted_metrics.join(", "))?;
        }
        match &self.forward {
            Some(forward) => write!(
                f,
                "forward: {} (timeout {}s)",
                forward.endpoint,
                forward.timeout.as_secs()
            ),
            None => write!(f, "forward: log only"),
        }
    }
}

/// Parse `host:port`, resolving host names
fn resolve_endpoint(field: &str, value: &str) -> Result<SocketAddr> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .with_context(|| {
            format!(
                "Configuration error: {} '{}' is not a valid host:port address",
                field, value
            )
        })
}

/// True when the path has no router capture or wildcard syntax
fn is_literal_route_path(path: &str) -> bool {
    !path.contains(['{', '}', '*']) && !path.split('/').any(|segment| segment.starts_with(':'))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn load_json(json: &str) -> Result<AppConfig> {
        let file = write_config(json);
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        AppConfig::load(&cli)
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "protocols": {
                "grpc": { "endpoint": "0.0.0.0:5317", "max_recv_msg_size_mib": 16 },
                "http": { "endpoint": "0.0.0.0:5318", "metrics_url_path": "/ingest" }
            },
            "restricted_metrics": ["cpu", "mem"],
            "forward": { "endpoint": "http://collector:4318/v1/metrics", "timeout_secs": 3 }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let protocols = config.protocols.as_ref().unwrap();
        let grpc = protocols.grpc.as_ref().unwrap();
        assert_eq!(grpc.endpoint.as_deref(), Some("0.0.0.0:5317"));
        assert_eq!(grpc.max_recv_msg_size_mib, Some(16));
        let http = protocols.http.as_ref().unwrap();
        assert_eq!(http.metrics_url_path.as_deref(), Some("/ingest"));
        assert_eq!(
            config.restricted_metrics,
            Some(vec!["cpu".to_string(), "mem".to_string()])
        );
        assert_eq!(config.forward.as_ref().unwrap().timeout_secs, Some(3));
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "restricted_metrics": [], "restricted_metric": ["typo"] }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.restricted_metrics, Some(vec![]));
        assert!(config.extra.get("restricted_metric").is_some());
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::from_sources(&CliConfig::default(), FileConfig::default()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.protocols, ProtocolsConfig::default());
        let http = config.protocols.http.as_ref().unwrap();
        assert_eq!(http.endpoint.port(), DEFAULT_HTTP_PORT);
        assert_eq!(http.metrics_url_path, "/v1/metrics");
        assert_eq!(http.max_request_body_size, 4 * 1024 * 1024);
        assert!(config.restricted_metrics.is_empty());
        assert!(config.forward.is_none());
    }

    #[test]
    fn test_app_config_from_file() {
        let config = load_json(
            r#"{
                "protocols": {
                    "grpc": { "endpoint": "127.0.0.1:5317", "max_recv_msg_size_mib": 8 },
                    "http": { "endpoint": "127.0.0.1:5318", "metrics_url_path": "/ingest" }
                },
                "restricted_metrics": ["cpu"],
                "forward": { "endpoint": "http://collector:4318/v1/metrics" }
            }"#,
        )
        .unwrap();

        let grpc = config.protocols.grpc.unwrap();
        assert_eq!(grpc.endpoint, "127.0.0.1:5317".parse().unwrap());
        assert_eq!(grpc.max_recv_msg_size, 8 * 1024 * 1024);
        let http = config.protocols.http.unwrap();
        assert_eq!(http.metrics_url_path, "/ingest");
        assert_eq!(http.max_request_body_size, 8 * 1024 * 1024);
        assert_eq!(config.restricted_metrics, vec!["cpu"]);
        let forward = config.forward.unwrap();
        assert_eq!(forward.endpoint, "http://collector:4318/v1/metrics");
        assert_eq!(
            forward.timeout,
            Duration::from_secs(DEFAULT_FORWARD_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_app_config_protocol_absent_from_file_is_disabled() {
        let config = load_json(r#"{ "protocols": { "http": {} } }"#).unwrap();
        assert!(config.protocols.grpc.is_none());
        assert_eq!(config.protocols.http, Some(HttpConfig::default()));
    }

    #[test]
    fn test_app_config_cli_override() {
        let file = write_config(
            r#"{
                "protocols": { "http": { "endpoint": "127.0.0.1:5318" } },
                "restricted_metrics": ["from_file"]
            }"#,
        );
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            grpc: Some(true),
            grpc_endpoint: Some("127.0.0.1:6317".to_string()),
            http: None,
            http_endpoint: Some("127.0.0.1:6318".to_string()),
            metrics_path: Some("/m".to_string()),
            restricted_metrics: vec!["cpu".to_string(), " ".to_string()],
            forward_endpoint: Some("https://collector/v1/metrics".to_string()),
        };
        let config = AppConfig::load(&cli).unwrap();

        assert_eq!(
            config.protocols.grpc.unwrap().endpoint,
            "127.0.0.1:6317".parse().unwrap()
        );
        let http = config.protocols.http.unwrap();
        assert_eq!(http.endpoint, "127.0.0.1:6318".parse().unwrap());
        assert_eq!(http.metrics_url_path, "/m");
        assert_eq!(config.restricted_metrics, vec!["cpu"]);
        assert_eq!(
            config.forward.unwrap().endpoint,
            "https://collector/v1/metrics"
        );
    }

    #[test]
    fn test_app_config_resolves_host_names() {
        let config = load_json(r#"{ "protocols": { "grpc": { "endpoint": "localhost:5317" } } }"#)
            .unwrap();
        assert_eq!(config.protocols.grpc.unwrap().endpoint.port(), 5317);
    }

    #[test]
    fn test_app_config_missing_file() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/definitely/not/here/metricgate.json")),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_app_config_invalid_json() {
        let err = load_json("{ not json").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_app_config_validation_no_protocols() {
        let err = load_json(r#"{ "protocols": {} }"#).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_app_config_validation_endpoint_collision() {
        let err = load_json(
            r#"{ "protocols": {
                "grpc": { "endpoint": "127.0.0.1:7000" },
                "http": { "endpoint": "127.0.0.1:7000" }
            } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot be the same"));
    }

    #[test]
    fn test_app_config_validation_bad_endpoint() {
        let err = load_json(r#"{ "protocols": { "http": { "endpoint": "no-port" } } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("protocols.http.endpoint"));
    }

    #[test]
    fn test_app_config_validation_metrics_path() {
        let err = load_json(r#"{ "protocols": { "http": { "metrics_url_path": "v1/metrics" } } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));

        for path in ["/v1/{", "/v1/{x}", "/v1/*rest", "/v1/:id", "/v1/}"] {
            let json = format!(
                r#"{{ "protocols": {{ "http": {{ "metrics_url_path": "{}" }} }} }}"#,
                path
            );
            let err = load_json(&json).unwrap_err();
            assert!(
                err.to_string().contains("must be a literal path"),
                "{} should be rejected",
                path
            );
        }

        let config =
            load_json(r#"{ "protocols": { "http": { "metrics_url_path": "/v1/a:b" } } }"#).unwrap();
        let http = config.protocols.http.unwrap();
        assert_eq!(http.metrics_url_path, "/v1/a:b");
    }

    #[test]
    fn test_app_config_validation_zero_message_size() {
        let err = load_json(r#"{ "protocols": { "grpc": { "max_recv_msg_size_mib": 0 } } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("max_recv_msg_size_mib"));
    }

    #[test]
    fn test_app_config_validation_forward_scheme() {
        let err = load_json(r#"{ "forward": { "endpoint": "collector:4318" } }"#).unwrap_err();
        assert!(err.to_string().contains("forward.endpoint"));
    }

    #[test]
    fn test_app_config_display() {
        let config = AppConfig {
            restricted_metrics: vec!["cpu".to_string()],
            ..Default::default()
        };
        let rendered = config.to_string();
        assert!(rendered.contains("0.0.0.0:4317"));
        assert!(rendered.contains("0.0.0.0:4318/v1/metrics"));
        assert!(rendered.contains("redact:  cpu"));
        assert!(rendered.contains("forward: log only"));
    }
}
