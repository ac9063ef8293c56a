//! OTLP content-type encoding and decoding
//!
//! Supports both protobuf (application/x-protobuf) and JSON (application/json) formats
//! as OTLP/HTTP defines them. Error bodies are `google.rpc.Status`
//! messages in the same encoding as the request.

use axum::http::{HeaderMap, header};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use prost::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::constants::{CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF};
use crate::domain::status::{StatusError, StatusProto};

/// Wire encoding negotiated from the request content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpEncoding {
    Protobuf,
    Json,
}

impl OtlpEncoding {
    /// Match a `Content-Type` value. Parameters are ignored, comparison is case-insensitive.
    pub fn from_content_type(value: &str) -> Option<Self> {
        let media_type = value.split(';').next().unwrap_or("").trim();
        if media_type.eq_ignore_ascii_case(CONTENT_TYPE_PROTOBUF) {
            Some(OtlpEncoding::Protobuf)
        } else if media_type.eq_ignore_ascii_case(CONTENT_TYPE_JSON) {
            Some(OtlpEncoding::Json)
        } else {
            None
        }
    }

    /// Parse content type from HTTP headers. `None` when missing or unsupported.
    #[inline]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::from_content_type)
    }

    /// Content type header value for responses
    #[inline]
    pub fn content_type(self) -> &'static str {
        match self {
            OtlpEncoding::Protobuf => CONTENT_TYPE_PROTOBUF,
            OtlpEncoding::Json => CONTENT_TYPE_JSON,
        }
    }

    #[inline]
    pub fn format_label(self) -> &'static str {
        match self {
            OtlpEncoding::Protobuf => "protobuf",
            OtlpEncoding::Json => "json",
        }
    }

    pub fn decode_request(self, body: &[u8]) -> Result<ExportMetricsServiceRequest, DecodeError> {
        self.decode(body)
    }

    /// An empty response is `{}` in JSON, matching the canonical OTLP mapping
    pub fn encode_response(
        self,
        response: &ExportMetricsServiceResponse,
    ) -> Result<Vec<u8>, EncodeError> {
        match (self, &response.partial_success) {
            (OtlpEncoding::Json, None) => Ok(b"{}".to_vec()),
            _ => self.encode(response),
        }
    }

    pub fn decode_response(self, body: &[u8]) -> Result<ExportMetricsServiceResponse, DecodeError> {
        self.decode(body)
    }

    pub fn encode_status(self, status: &StatusError) -> Result<Vec<u8>, EncodeError> {
        self.encode(&status.to_proto())
    }

    pub fn decode_status(self, body: &[u8]) -> Result<StatusError, DecodeError> {
        self.decode::<StatusProto>(body).map(StatusError::from_proto)
    }

    fn decode<T>(self, body: &[u8]) -> Result<T, DecodeError>
    where
        T: Message + Default + for<'de> Deserialize<'de>,
    {
        match self {
            OtlpEncoding::Protobuf => {
                T::decode(body).map_err(|e| DecodeError::Protobuf(e.to_string()))
            }
            OtlpEncoding::Json => {
                serde_json::from_slice(body).map_err(|e| DecodeError::Json(e.to_string()))
            }
        }
    }

    fn encode<T>(self, message: &T) -> Result<Vec<u8>, EncodeError>
    where
        T: Message + Serialize,
    {
        match self {
            OtlpEncoding::Protobuf => Ok(message.encode_to_vec()),
            OtlpEncoding::Json => serde_json::to_vec(message).map_err(EncodeError::Json),
        }
    }
}

/// Error returned when decoding fails
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("protobuf decode error: {0}")]
    Protobuf(String),
    #[error("JSON decode error: {0}")]
    Json(String),
}

/// Error returned when encoding a response or status fails
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}
