//! Failure types and normalization.
//!
//! A [`Transport`](crate::Transport) reports failures as [`TransportFailure`]:
//! the raw, transport-shaped description of what went wrong. Callers never
//! see it directly. Every failure is funnelled through [`normalize`] (or a
//! custom [`ErrorNormalizer`]) into a [`RequestError`], the single error
//! shape exposed in request state and to error callbacks.
//!
//! ## Error code priority
//!
//! [`RequestError::code`] takes the first non-empty of:
//!
//! 1. a `code` field in the response body
//! 2. the transport's own code
//! 3. the response status
//!
//! Empty values (`null`, `false`, `0`, `""`) are skipped, so a body with
//! `"code": 0` falls through to the next source.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;
use smol_str::SmolStr;
use thiserror::Error;

/// A machine-readable error code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Integer code, including HTTP statuses.
    Number(i64),
    /// Textual code such as `ECONNREFUSED`.
    Text(SmolStr),
}

impl ErrorCode {
    /// Reads a code from a JSON value, skipping empty values.
    pub fn from_value(value: &Value) -> Option<ErrorCode> {
        match value {
            Value::Null | Value::Bool(false) => None,
            Value::Number(number) => match number.as_i64() {
                Some(0) => None,
                Some(n) => Some(ErrorCode::Number(n)),
                None if number.as_f64() == Some(0.0) => None,
                None => Some(ErrorCode::Text(SmolStr::from(number.to_string()))),
            },
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(ErrorCode::Text(SmolStr::from(text.as_str()))),
            other => Some(ErrorCode::Text(SmolStr::from(other.to_string()))),
        }
    }

    fn non_empty(self) -> Option<ErrorCode> {
        match &self {
            ErrorCode::Number(0) => None,
            ErrorCode::Text(text) if text.is_empty() => None,
            _ => Some(self),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Number(n) => write!(f, "{n}"),
            ErrorCode::Text(text) => f.write_str(text),
        }
    }
}

impl From<StatusCode> for ErrorCode {
    fn from(status: StatusCode) -> Self {
        ErrorCode::Number(i64::from(status.as_u16()))
    }
}

impl From<i64> for ErrorCode {
    fn from(value: i64) -> Self {
        ErrorCode::Number(value)
    }
}

impl From<&str> for ErrorCode {
    fn from(value: &str) -> Self {
        ErrorCode::Text(SmolStr::new(value))
    }
}

/// Broad category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The call was cancelled cooperatively.
    Cancelled,
    /// Connection, DNS or I/O failure before a response arrived.
    Network,
    /// A response arrived with an unsuccessful status.
    Status,
    /// The response body could not be decoded.
    Decode,
    /// Anything else.
    Other,
}

/// The response part of a failure that got as far as a response.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureResponse {
    /// Response status.
    pub status: StatusCode,
    /// Decoded body, if there was one.
    pub data: Option<Value>,
}

impl FailureResponse {
    /// Canonical reason phrase for the status.
    pub fn status_text(&self) -> Option<&'static str> {
        self.status.canonical_reason()
    }
}

/// A raw failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", self.message.as_deref().unwrap_or("transport failure"))]
pub struct TransportFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Transport-specific code.
    pub code: Option<ErrorCode>,
    /// Human-readable description.
    pub message: Option<String>,
    /// Response details, when a response was received.
    pub response: Option<FailureResponse>,
}

impl TransportFailure {
    /// Creates a failure of `kind` with a message.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: Some(message.into()),
            response: None,
        }
    }

    /// A cooperative cancellation, with the message given to `cancel`.
    pub fn cancelled(message: Option<String>) -> Self {
        Self {
            kind: FailureKind::Cancelled,
            code: None,
            message,
            response: None,
        }
    }

    /// A failure before any response arrived.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    /// An unsuccessful response with its status and body.
    pub fn status(status: StatusCode, data: Option<Value>) -> Self {
        let message = format!("Request failed with status code {}", status.as_u16());
        Self {
            kind: FailureKind::Status,
            code: None,
            message: Some(message),
            response: Some(FailureResponse { status, data }),
        }
    }

    /// A body that could not be decoded.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Decode, message)
    }

    /// Any other failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }

    /// Attaches a transport-specific code.
    pub fn with_code(self, code: impl Into<ErrorCode>) -> Self {
        Self {
            code: Some(code.into()),
            ..self
        }
    }

    /// Attaches response details.
    pub fn with_response(self, status: StatusCode, data: Option<Value>) -> Self {
        Self {
            response: Some(FailureResponse { status, data }),
            ..self
        }
    }

    /// Returns `true` for cooperative cancellations.
    pub fn is_cancel(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

/// The normalized error surfaced to callers.
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{}", self.message.as_deref().unwrap_or("request failed"))]
pub struct RequestError {
    /// Response body of the failed call.
    pub data: Option<Value>,
    /// Failure message, or the response status text.
    pub message: Option<String>,
    /// Error code; see the module docs for the priority order.
    pub code: Option<ErrorCode>,
    /// `true` when the call was cancelled rather than failed.
    pub is_cancel: bool,
    /// The failure this error was built from.
    pub original: Option<TransportFailure>,
}

impl RequestError {
    /// Returns `true` when the call was cancelled rather than failed.
    pub fn is_cancel(&self) -> bool {
        self.is_cancel
    }
}

impl From<TransportFailure> for RequestError {
    fn from(failure: TransportFailure) -> Self {
        normalize(Some(&failure))
    }
}

/// Replaces [`normalize`] for a context or a call.
pub type ErrorNormalizer = Arc<dyn Fn(Option<&TransportFailure>) -> RequestError + Send + Sync>;

/// Normalizes a transport failure into a [`RequestError`].
///
/// `None` yields an error with every field empty.
pub fn normalize(failure: Option<&TransportFailure>) -> RequestError {
    let Some(failure) = failure else {
        return RequestError::default();
    };

    let response = failure.response.as_ref();
    let data = response.and_then(|response| response.data.clone());

    let body_code = data
        .as_ref()
        .and_then(|data| data.get("code"))
        .and_then(ErrorCode::from_value);
    let code = body_code
        .or_else(|| failure.code.clone().and_then(ErrorCode::non_empty))
        .or_else(|| response.map(|response| ErrorCode::from(response.status)));

    let message = failure.message.clone().or_else(|| {
        response
            .and_then(FailureResponse::status_text)
            .map(str::to_string)
    });

    RequestError {
        data,
        message,
        code,
        is_cancel: failure.is_cancel(),
        original: Some(failure.clone()),
    }
}
