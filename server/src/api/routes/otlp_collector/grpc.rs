//! gRPC OTLP server

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
    metrics_service_server::{MetricsService, MetricsServiceServer},
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Server as TonicServer;
use tonic::{Request, Response, Status};

use crate::domain::metrics::{MetricsExporter, Transport};

/// Serve the metrics service on an already bound listener until `shutdown_rx` flips to true
pub async fn serve(
    listener: TcpListener,
    exporter: Arc<MetricsExporter>,
    max_recv_msg_size: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), tonic::transport::Error> {
    let service = MetricsServiceServer::new(OtlpMetricsService::new(exporter))
        .accept_compressed(CompressionEncoding::Gzip)
        .max_decoding_message_size(max_recv_msg_size);

    TonicServer::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            tracing::debug!("OTLP gRPC server shutting down");
        })
        .await
}

/// gRPC metrics service
pub struct OtlpMetricsService {
    exporter: Arc<MetricsExporter>,
}

impl OtlpMetricsService {
    pub fn new(exporter: Arc<MetricsExporter>) -> Self {
        Self { exporter }
    }
}

#[tonic::async_trait]
impl MetricsService for OtlpMetricsService {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        self.exporter
            .export(request.into_inner(), Transport::Grpc, "protobuf")
            .await
            .map(Response::new)
            .map_err(Status::from)
    }
}
