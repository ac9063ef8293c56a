//! Transport-neutral status codes
//!
//! One table shared by the HTTP and gRPC adapters so both report equivalent failures:
//! - downstream error → status (pass-through, otherwise permanent/transient classification)
//! - HTTP status ↔ status code
//! - `tonic::Status` ↔ status
//! - `google.rpc.Status` wire message used for encoded error bodies

use std::fmt;

use axum::http::StatusCode as HttpStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status codes a failed export can carry. Values match the gRPC code numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Code {
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    pub const ALL: [Code; 13] = [
        Code::Cancelled,
        Code::Unknown,
        Code::InvalidArgument,
        Code::DeadlineExceeded,
        Code::PermissionDenied,
        Code::ResourceExhausted,
        Code::Aborted,
        Code::OutOfRange,
        Code::Unimplemented,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
        Code::Unauthenticated,
    ];

    #[inline]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_i32() == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Code::Cancelled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
            Code::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Status code for an HTTP response status
    pub fn from_http(status: HttpStatus) -> Self {
        match status {
            HttpStatus::BAD_REQUEST => Code::InvalidArgument,
            HttpStatus::UNAUTHORIZED => Code::Unauthenticated,
            HttpStatus::FORBIDDEN => Code::PermissionDenied,
            HttpStatus::NOT_FOUND => Code::Unimplemented,
            HttpStatus::TOO_MANY_REQUESTS => Code::ResourceExhausted,
            HttpStatus::BAD_GATEWAY
            | HttpStatus::SERVICE_UNAVAILABLE
            | HttpStatus::GATEWAY_TIMEOUT => Code::Unavailable,
            _ => Code::Unknown,
        }
    }

    /// HTTP response status reported for this code
    pub fn to_http(self) -> HttpStatus {
        match self {
            Code::Cancelled
            | Code::DeadlineExceeded
            | Code::Aborted
            | Code::OutOfRange
            | Code::Unavailable
            | Code::DataLoss => HttpStatus::SERVICE_UNAVAILABLE,
            Code::ResourceExhausted => HttpStatus::TOO_MANY_REQUESTS,
            _ => HttpStatus::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Code> for tonic::Code {
    fn from(code: Code) -> Self {
        tonic::Code::from_i32(code.as_i32())
    }
}

impl From<tonic::Code> for Code {
    /// gRPC codes outside the export vocabulary (`Ok`, `NotFound`, `AlreadyExists`,
    /// `FailedPrecondition`) collapse to `Unknown`.
    fn from(code: tonic::Code) -> Self {
        Code::from_i32(code as i32).unwrap_or(Code::Unknown)
    }
}

/// A failed export: status code plus human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct StatusError {
    code: Code,
    message: String,
}

impl StatusError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Build a status from an HTTP status code and message
    pub fn from_http(status: HttpStatus, message: impl Into<String>) -> Self {
        Self::new(Code::from_http(status), message)
    }

    #[inline]
    pub fn code(&self) -> Code {
        self.code
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP response status for this error
    #[inline]
    pub fn http_status(&self) -> HttpStatus {
        self.code.to_http()
    }

    pub fn to_proto(&self) -> StatusProto {
        StatusProto {
            code: self.code.as_i32(),
            message: self.message.clone(),
        }
    }

    /// Unrecognized wire codes (including `0`) become `Unknown`.
    pub fn from_proto(proto: StatusProto) -> Self {
        Self::new(
            Code::from_i32(proto.code).unwrap_or(Code::Unknown),
            proto.message,
        )
    }
}

impl From<StatusError> for tonic::Status {
    fn from(err: StatusError) -> Self {
        tonic::Status::new(err.code.into(), err.message)
    }
}

impl From<tonic::Status> for StatusError {
    fn from(status: tonic::Status) -> Self {
        Self::new(status.code().into(), status.message())
    }
}

/// `google.rpc.Status` wire message.
///
/// Field `details` (tag 3) is never populated; unknown fields are skipped on decode.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusProto {
    #[prost(int32, tag = "1")]
    #[serde(default)]
    pub code: i32,
    #[prost(string, tag = "2")]
    #[serde(default)]
    pub message: String,
}

/// Translate a downstream error into a status.
///
/// A `StatusError` or `tonic::Status` anywhere in the source chain is passed through
/// unchanged. Otherwise permanent errors become `Internal` (non-retryable server-side
/// failure) and everything else becomes `Unavailable` (retryable).
pub fn status_from_error<E>(err: &E, is_permanent: impl FnOnce(&E) -> bool) -> StatusError
where
    E: std::error::Error + 'static,
{
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(status) = e.downcast_ref::<StatusError>() {
            return status.clone();
        }
        if let Some(status) = e.downcast_ref::<tonic::Status>() {
            return status.clone().into();
        }
        current = e.source();
    }

    let code = if is_permanent(err) {
        Code::Internal
    } else {
        Code::Unavailable
    };
    StatusError::new(code, err.to_string())
}
