//! Metrics export endpoint

use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::OtlpState;
use super::encoding::OtlpEncoding;
use crate::core::constants::{
    CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF, FALLBACK_ERROR_BODY, NOT_FOUND_MESSAGE,
};
use crate::domain::metrics::Transport;
use crate::domain::status::{Code, StatusError};

pub async fn export(
    State(state): State<OtlpState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if method != Method::POST {
        return plain_text(
            StatusCode::METHOD_NOT_ALLOWED,
            "405 method not allowed, supported: [POST]".to_string(),
        );
    }

    let Some(encoding) = OtlpEncoding::from_headers(&headers) else {
        return plain_text(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!(
                "415 unsupported media type, supported: [{}, {}]",
                CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF
            ),
        );
    };

    if let Some(coding) = unsupported_content_encoding(&headers) {
        tracing::debug!(content_encoding = %coding, "Rejecting OTLP request body encoding");
        let status = StatusError::new(
            Code::InvalidArgument,
            format!("unsupported content encoding: {}", coding),
        );
        return status_response(encoding, &status, StatusCode::BAD_REQUEST);
    }

    let body = match to_bytes(body, state.body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read OTLP request body");
            let status = StatusError::new(Code::InvalidArgument, e.to_string());
            return status_response(encoding, &status, StatusCode::BAD_REQUEST);
        }
    };

    let request = match encoding.decode_request(&body) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(
                error = %e,
                content_type = encoding.content_type(),
                "Failed to decode OTLP request"
            );
            let status = StatusError::new(Code::InvalidArgument, e.to_string());
            return status_response(encoding, &status, StatusCode::BAD_REQUEST);
        }
    };

    let response = match state
        .exporter
        .export(request, Transport::Http, encoding.format_label())
        .await
    {
        Ok(response) => response,
        Err(status) => return status_response(encoding, &status, status.http_status()),
    };

    match encoding.encode_response(&response) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoding.content_type())],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode OTLP response");
            let status = StatusError::new(Code::Unknown, e.to_string());
            status_response(encoding, &status, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Content-Encoding left on the request after gzip decompression, unless it is `identity`
fn unsupported_content_encoding(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_ENCODING)?;
    let coding = String::from_utf8_lossy(value.as_bytes());
    let coding = coding.trim();
    if coding.is_empty() || coding.eq_ignore_ascii_case("identity") {
        return None;
    }
    Some(coding.to_string())
}

/// Unmatched routes: a negotiated status body, or the fixed fallback when the
/// request content type is unusable.
pub async fn fallback(headers: HeaderMap) -> Response {
    let status = StatusError::from_http(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE);
    match OtlpEncoding::from_headers(&headers) {
        Some(encoding) => status_response(encoding, &status, StatusCode::NOT_FOUND),
        None => fallback_error(),
    }
}

/// Write a status body in the request encoding with an explicit HTTP status
fn status_response(encoding: OtlpEncoding, status: &StatusError, http: StatusCode) -> Response {
    match encoding.encode_status(status) {
        Ok(bytes) => (http, [(header::CONTENT_TYPE, encoding.content_type())], bytes).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode OTLP error status");
            fallback_error()
        }
    }
}

fn fallback_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, CONTENT_TYPE_JSON)],
        FALLBACK_ERROR_BODY,
    )
        .into_response()
}

#[inline]
fn plain_text(status: StatusCode, message: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message,
    )
        .into_response()
}
