//! The transport abstraction.
//!
//! [`Transport`] is the seam between fetchbox and an actual HTTP client. It
//! receives a finished [`RequestConfig`] plus a [`CancelToken`] and resolves
//! to a [`RawResponse`] or a [`TransportFailure`].
//!
//! Implementations should treat unsuccessful statuses as failures
//! ([`TransportFailure::status`]) and honour the token by failing with
//! [`CancelToken::to_failure`]. The executor races the call against the
//! token as well, so a transport that ignores cancellation still settles
//! promptly; it just keeps doing the work in the background.

use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use serde_json::Value;

use crate::{CancelToken, RequestConfig, TransportFailure};

/// A successful response as seen by fetchbox.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Decoded body.
    pub data: Value,
}

impl RawResponse {
    /// Creates a response with empty headers.
    pub fn new(status: StatusCode, data: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            data,
        }
    }

    /// A `200 OK` response carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self::new(StatusCode::OK, data)
    }

    /// Canonical reason phrase for the status.
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or_default()
    }
}

/// Sends a request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the call described by `config`.
    async fn invoke(
        &self,
        config: RequestConfig,
        token: CancelToken,
    ) -> Result<RawResponse, TransportFailure>;

    /// Name used in log events.
    fn name(&self) -> &str {
        "transport"
    }
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn invoke(
        &self,
        config: RequestConfig,
        token: CancelToken,
    ) -> Result<RawResponse, TransportFailure> {
        (**self).invoke(config, token).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    async fn invoke(
        &self,
        config: RequestConfig,
        token: CancelToken,
    ) -> Result<RawResponse, TransportFailure> {
        (**self).invoke(config, token).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
