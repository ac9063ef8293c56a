use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_FORWARD_ENDPOINT, ENV_GRPC_ENABLED, ENV_GRPC_ENDPOINT, ENV_HTTP_ENABLED,
    ENV_HTTP_ENDPOINT, ENV_METRICS_PATH, ENV_RESTRICTED_METRICS,
};

#[derive(Parser)]
#[command(name = "metricgate")]
#[command(version, about = "OTLP metrics gateway with metric redaction", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Enable OTLP gRPC receiver
    #[arg(long, global = true, env = ENV_GRPC_ENABLED)]
    pub grpc: Option<bool>,

    /// OTLP gRPC bind address (host:port)
    #[arg(long, global = true, env = ENV_GRPC_ENDPOINT)]
    pub grpc_endpoint: Option<String>,

    /// Enable OTLP HTTP receiver
    #[arg(long, global = true, env = ENV_HTTP_ENABLED)]
    pub http: Option<bool>,

    /// OTLP HTTP bind address (host:port)
    #[arg(long, global = true, env = ENV_HTTP_ENDPOINT)]
    pub http_endpoint: Option<String>,

    /// HTTP path accepting metrics exports
    #[arg(long, global = true, env = ENV_METRICS_PATH)]
    pub metrics_path: Option<String>,

    /// Metric name to redact, prefixed per resource with "<service.name>_" (repeatable)
    #[arg(
        long = "restricted-metric",
        global = true,
        env = ENV_RESTRICTED_METRICS,
        value_delimiter = ','
    )]
    pub restricted_metrics: Vec<String>,

    /// Forward filtered batches to this OTLP/HTTP metrics URL instead of logging them
    #[arg(long, global = true, env = ENV_FORWARD_ENDPOINT)]
    pub forward_endpoint: Option<String>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the gateway (default command)
    Start,
    /// Load and validate the configuration, print it and exit
    Validate,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub grpc: Option<bool>,
    pub grpc_endpoint: Option<String>,
    pub http: Option<bool>,
    pub http_endpoint: Option<String>,
    pub metrics_path: Option<String>,
    pub restricted_metrics: Vec<String>,
    pub forward_endpoint: Option<String>,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            grpc: cli.grpc,
            grpc_endpoint: cli.grpc_endpoint,
            http: cli.http,
            http_endpoint: cli.http_endpoint,
            metrics_path: cli.metrics_path,
            restricted_metrics: cli.restricted_metrics,
            forward_endpoint: cli.forward_endpoint,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let mut cli = Cli::parse();
    let command = cli.command.take();
    (cli.into(), command)
}
