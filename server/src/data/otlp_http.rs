//! OTLP/HTTP forwarding consumer
//!
//! Posts each filtered batch as protobuf to a downstream OTLP/HTTP endpoint.
//! Failures are classified so the export handler reports retryable ones as
//! `Unavailable` and the rest as `Internal`.

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use prost::Message;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;

use crate::core::config::ForwardConfig;
use crate::core::constants::CONTENT_TYPE_PROTOBUF;
use crate::domain::metrics::{ConsumerError, MetricsConsumer};
use crate::domain::status::StatusProto;

/// Longest response body excerpt carried into an error message
const MAX_ERROR_BODY_CHARS: usize = 256;

#[derive(Debug)]
pub struct OtlpHttpForwarder {
    client: reqwest::Client,
    endpoint: String,
}

impl OtlpHttpForwarder {
    pub fn new(config: &ForwardConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        tracing::debug!(
            endpoint = %config.endpoint,
            timeout_secs = config.timeout.as_secs(),
            "OTLP/HTTP forwarder initialized"
        );
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl MetricsConsumer for OtlpHttpForwarder {
    async fn consume_metrics(
        &self,
        metrics: ExportMetricsServiceRequest,
    ) -> Result<(), ConsumerError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, CONTENT_TYPE_PROTOBUF)
            .body(metrics.encode_to_vec())
            .send()
            .await
            .map_err(|e| {
                let message = format!("POST {} failed: {}", self.endpoint, e);
                if e.is_builder() {
                    ConsumerError::permanent(message)
                } else {
                    ConsumerError::transient(message)
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            tracing::trace!(endpoint = %self.endpoint, %status, "Metrics forwarded");
            return Ok(());
        }

        let is_protobuf = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with(CONTENT_TYPE_PROTOBUF));
        let body = resp.bytes().await.unwrap_or_default();
        let detail = error_detail(&body, is_protobuf);

        Err(classify(
            status,
            format!("POST {} returned {}: {}", self.endpoint, status, detail),
        ))
    }
}

/// Retryable statuses are transient, any other 4xx is permanent, remaining 5xx are transient
fn classify(status: StatusCode, message: String) -> ConsumerError {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ConsumerError::transient(message),
        s if s.is_client_error() => ConsumerError::permanent(message),
        _ => ConsumerError::transient(message),
    }
}

/// Message from an OTLP status body, else a trimmed excerpt of the raw body
fn error_detail(body: &[u8], is_protobuf: bool) -> String {
    if is_protobuf
        && let Ok(status) = StatusProto::decode(body)
        && !status.message.is_empty()
    {
        return status.message;
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "empty response body".to_string();
    }
    text.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use parking_lot::Mutex;
    use tokio::net::TcpListener;

    use super::*;
    use crate::domain::metrics::testing::make_request;

    #[derive(Clone)]
    struct Stub {
        status: StatusCode,
        body: Vec<u8>,
        received: Arc<Mutex<Vec<ExportMetricsServiceRequest>>>,
    }

    async fn stub_handler(State(stub): State<Stub>, body: Bytes) -> impl IntoResponse {
        if let Ok(req) = ExportMetricsServiceRequest::decode(body.as_ref()) {
            stub.received.lock().push(req);
        }
        (
            stub.status,
            [(header::CONTENT_TYPE, CONTENT_TYPE_PROTOBUF)],
            stub.body.clone(),
        )
    }

    async fn spawn_stub(stub: Stub) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/v1/metrics", post(stub_handler))
            .with_state(stub);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn forwarder(endpoint: String) -> OtlpHttpForwarder {
        OtlpHttpForwarder::new(&ForwardConfig {
            endpoint,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn stub(status: StatusCode, body: Vec<u8>) -> Stub {
        Stub {
            status,
            body,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[test]
    fn test_classify_statuses() {
        let transient = [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
            StatusCode::INTERNAL_SERVER_ERROR,
        ];
        for status in transient {
            assert!(!classify(status, String::new()).is_permanent(), "{status}");
        }

        let permanent = [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::NOT_FOUND,
            StatusCode::PAYLOAD_TOO_LARGE,
        ];
        for status in permanent {
            assert!(classify(status, String::new()).is_permanent(), "{status}");
        }
    }

    #[test]
    fn test_error_detail() {
        let status = StatusProto {
            code: 14,
            message: "collector overloaded".to_string(),
        };
        assert_eq!(
            error_detail(&status.encode_to_vec(), true),
            "collector overloaded"
        );
        assert_eq!(error_detail(b"  plain failure \n", false), "plain failure");
        assert_eq!(error_detail(b"", false), "empty response body");

        let long = "x".repeat(1000);
        assert_eq!(
            error_detail(long.as_bytes(), false).len(),
            MAX_ERROR_BODY_CHARS
        );
    }

    #[tokio::test]
    async fn test_forward_success() {
        let stub = stub(StatusCode::OK, Vec::new());
        let received = stub.received.clone();
        let addr = spawn_stub(stub).await;

        let fwd = forwarder(format!("http://{addr}/v1/metrics"));
        let request = make_request(Some("svc"), &["svc_cpu"]);
        fwd.consume_metrics(request.clone()).await.unwrap();

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], request);
    }

    #[tokio::test]
    async fn test_forward_unavailable_is_transient() {
        let body = StatusProto {
            code: 14,
            message: "collector overloaded".to_string(),
        }
        .encode_to_vec();
        let addr = spawn_stub(stub(StatusCode::SERVICE_UNAVAILABLE, body)).await;

        let err = forwarder(format!("http://{addr}/v1/metrics"))
            .consume_metrics(make_request(None, &["cpu"]))
            .await
            .unwrap_err();
        assert!(!err.is_permanent());
        assert!(err.to_string().contains("collector overloaded"));
    }

    #[tokio::test]
    async fn test_forward_bad_request_is_permanent() {
        let addr = spawn_stub(stub(StatusCode::BAD_REQUEST, Vec::new())).await;

        let err = forwarder(format!("http://{addr}/v1/metrics"))
            .consume_metrics(make_request(None, &["cpu"]))
            .await
            .unwrap_err();
        assert!(err.is_permanent());
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_forward_connection_refused_is_transient() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let err = forwarder(format!("http://{addr}/v1/metrics"))
            .consume_metrics(make_request(None, &["cpu"]))
            .await
            .unwrap_err();
        assert!(!err.is_permanent());
    }
}
