//! Core application

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::api::{OtlpReceiver, ReceiverError};
use crate::core::banner;
use crate::core::cli::{self, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG, SHUTDOWN_TIMEOUT_SECS};
use crate::core::shutdown::ShutdownService;
use crate::data::OtlpHttpForwarder;
use crate::domain::metrics::{LogConsumer, MetricsConsumer, MetricsExporter, Transport};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub receiver: OtlpReceiver,
    fatal_rx: mpsc::UnboundedReceiver<ReceiverError>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let config = AppConfig::load(&cli_config)?;

        match command {
            Some(Commands::Validate) => {
                println!("Configuration is valid\n\n{}", config);
                return Ok(());
            }
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(config)?;
        app.serve().await
    }

    fn init(config: AppConfig) -> Result<Self> {
        let consumer: Arc<dyn MetricsConsumer> = match &config.forward {
            Some(forward) => Arc::new(
                OtlpHttpForwarder::new(forward)
                    .context("Failed to initialize OTLP/HTTP forwarder")?,
            ),
            None => Arc::new(LogConsumer),
        };

        let exporter = Arc::new(MetricsExporter::new(
            consumer,
            config.restricted_metrics.clone().into(),
        ));
        let (receiver, fatal_rx) = OtlpReceiver::new(config.protocols.clone(), exporter);

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            receiver,
            fatal_rx,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    /// Start the receiver, block until a signal or a fatal serve error, then drain
    async fn serve(mut self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        self.shutdown.install_signal_handlers();

        self.receiver
            .start()
            .await
            .context("Failed to start OTLP receiver")?;

        banner::print_banner(
            &self.config,
            self.receiver.local_addr(Transport::Grpc).await,
            self.receiver.local_addr(Transport::Http).await,
        );

        let fatal = tokio::select! {
            _ = self.shutdown.wait() => None,
            Some(err) = self.fatal_rx.recv() => Some(err),
        };
        self.shutdown.trigger();

        let timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        if tokio::time::timeout(timeout, self.receiver.shutdown())
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Timeout waiting for OTLP receiver to stop"
            );
        }
        tracing::debug!("Shutdown complete");

        match fatal {
            Some(err) => Err(err).context("OTLP receiver failed"),
            None => Ok(()),
        }
    }
}
