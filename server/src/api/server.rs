//! OTLP receiver lifecycle
//!
//! Owns the gRPC and HTTP listeners. Each transport binds during `start` and then
//! serves from its own background task; `shutdown` drains both and joins the tasks.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use super::routes::otlp_collector::{self, grpc};
use crate::core::config::{GrpcConfig, HttpConfig, ProtocolsConfig};
use crate::domain::metrics::{MetricsExporter, Transport};

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("OTLP receiver already started")]
    AlreadyStarted,

    #[error("failed to bind OTLP {transport} endpoint {addr}: {source}")]
    Bind {
        transport: Transport,
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("OTLP {transport} server stopped unexpectedly: {message}")]
    Serve { transport: Transport, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReceiverState::Stopped => "stopped",
            ReceiverState::Starting => "starting",
            ReceiverState::Running => "running",
            ReceiverState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// A started transport: its bound address, stop signal and serve task
struct ServerHandle {
    transport: Transport,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct OtlpReceiver {
    protocols: ProtocolsConfig,
    exporter: Arc<MetricsExporter>,
    fatal_tx: mpsc::UnboundedSender<ReceiverError>,
    state: RwLock<ReceiverState>,
    /// Held across start and shutdown so the two never interleave
    servers: Mutex<Vec<ServerHandle>>,
}

impl OtlpReceiver {
    /// Build a receiver. The returned channel yields serve failures that happen after `start`.
    pub fn new(
        protocols: ProtocolsConfig,
        exporter: Arc<MetricsExporter>,
    ) -> (Self, mpsc::UnboundedReceiver<ReceiverError>) {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let receiver = Self {
            protocols,
            exporter,
            fatal_tx,
            state: RwLock::new(ReceiverState::Stopped),
            servers: Mutex::new(Vec::new()),
        };
        (receiver, fatal_rx)
    }

    pub fn state(&self) -> ReceiverState {
        *self.state.read()
    }

    /// Bound address of a running transport
    pub async fn local_addr(&self, transport: Transport) -> Option<SocketAddr> {
        self.servers
            .lock()
            .await
            .iter()
            .find(|s| s.transport == transport)
            .map(|s| s.local_addr)
    }

    /// Bind and serve every configured transport, gRPC first.
    ///
    /// If HTTP fails after gRPC came up, gRPC is stopped before the error is returned.
    pub async fn start(&self) -> Result<(), ReceiverError> {
        let mut servers = self.servers.lock().await;
        if !servers.is_empty() {
            return Err(ReceiverError::AlreadyStarted);
        }
        self.set_state(ReceiverState::Starting);

        if let Some(config) = &self.protocols.grpc {
            match self.start_grpc(config).await {
                Ok(handle) => servers.push(handle),
                Err(e) => {
                    self.set_state(ReceiverState::Stopped);
                    return Err(e);
                }
            }
        }

        if let Some(config) = &self.protocols.http {
            match self.start_http(config).await {
                Ok(handle) => servers.push(handle),
                Err(e) => {
                    stop_servers(&mut servers).await;
                    self.set_state(ReceiverState::Stopped);
                    return Err(e);
                }
            }
        }

        self.set_state(ReceiverState::Running);
        Ok(())
    }

    /// Gracefully stop every started transport. Safe to call more than once.
    pub async fn shutdown(&self) {
        let mut servers = self.servers.lock().await;
        if servers.is_empty() {
            return;
        }
        self.set_state(ReceiverState::Stopping);
        stop_servers(&mut servers).await;
        self.set_state(ReceiverState::Stopped);
        tracing::debug!("OTLP receiver stopped");
    }

    async fn start_grpc(&self, config: &GrpcConfig) -> Result<ServerHandle, ReceiverError> {
        let (listener, local_addr) = bind(Transport::Grpc, config.endpoint).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let exporter = self.exporter.clone();
        let max_recv_msg_size = config.max_recv_msg_size;
        let task = spawn_serve(
            Transport::Grpc,
            self.fatal_tx.clone(),
            grpc::serve(listener, exporter, max_recv_msg_size, shutdown_rx),
        );

        tracing::info!(transport = "grpc", %local_addr, "OTLP receiver listening");
        Ok(ServerHandle {
            transport: Transport::Grpc,
            local_addr,
            shutdown_tx,
            task,
        })
    }

    async fn start_http(&self, config: &HttpConfig) -> Result<ServerHandle, ReceiverError> {
        let (listener, local_addr) = bind(Transport::Http, config.endpoint).await?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let router = otlp_collector::routes(self.exporter.clone(), config);
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            tracing::debug!("OTLP HTTP server shutting down");
        });
        let task = spawn_serve(
            Transport::Http,
            self.fatal_tx.clone(),
            serve.into_future(),
        );

        tracing::info!(
            transport = "http",
            %local_addr,
            path = %config.metrics_url_path,
            "OTLP receiver listening"
        );
        Ok(ServerHandle {
            transport: Transport::Http,
            local_addr,
            shutdown_tx,
            task,
        })
    }

    fn set_state(&self, state: ReceiverState) {
        let mut current = self.state.write();
        tracing::trace!(from = %*current, to = %state, "OTLP receiver state change");
        *current = state;
    }
}

async fn bind(
    transport: Transport,
    addr: SocketAddr,
) -> Result<(TcpListener, SocketAddr), ReceiverError> {
    let to_error = |source| ReceiverError::Bind {
        transport,
        addr,
        source,
    };
    let listener = TcpListener::bind(addr).await.map_err(to_error)?;
    let local_addr = listener.local_addr().map_err(to_error)?;
    Ok((listener, local_addr))
}

/// Run a server on its own task; a serve error or a panic is reported on the fatal channel
fn spawn_serve<F, E>(
    transport: Transport,
    fatal_tx: mpsc::UnboundedSender<ReceiverError>,
    serve: F,
) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let server = tokio::spawn(serve);
    tokio::spawn(async move {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => report_fatal(&fatal_tx, transport, e.to_string()),
            Err(e) if e.is_panic() => {
                report_fatal(&fatal_tx, transport, format!("serve task panicked: {}", e))
            }
            Err(e) => tracing::debug!(%transport, error = %e, "OTLP server task cancelled"),
        }
    })
}

/// Signal every server first so both drain concurrently, then join the tasks
async fn stop_servers(servers: &mut Vec<ServerHandle>) {
    for server in servers.iter() {
        let _ = server.shutdown_tx.send(true);
    }
    for server in servers.drain(..) {
        if let Err(e) = server.task.await {
            tracing::warn!(transport = %server.transport, error = %e, "OTLP server task failed");
        }
    }
}

fn report_fatal(
    fatal_tx: &mpsc::UnboundedSender<ReceiverError>,
    transport: Transport,
    message: String,
) {
    tracing::error!(%transport, error = %message, "OTLP server stopped unexpectedly");
    let _ = fatal_tx.send(ReceiverError::Serve { transport, message });
}
