//! Request execution.
//!
//! A [`Requester`] turns arguments into calls. [`Requester::call`] only
//! describes the call; nothing is sent until the returned handle's
//! [`ready`](RequestHandle::ready) future is awaited:
//!
//! ```ignore
//! let users = Requester::new(&context, |page: &u32| {
//!     request::<Vec<User>>(RequestConfig::get("/users").with_params(json!({ "page": page })))
//! });
//!
//! let call = users.call(&2);
//! let canceller = call.canceller();
//! let (page, response) = call.ready().await?;
//! ```
//!
//! Every call runs under its own cancel token, tracked in the requester's
//! pending set while in flight. Failures come back normalized as
//! [`RequestError`]; a cancelled call settles with
//! [`RequestError::is_cancel`] set.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use fetchbox_core::{
    CancelSource, CancelToken, ErrorNormalizer, RawResponse, Request, RequestConfig,
    RequestError, Transport, TransportFailure,
};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::context::{ContextConfig, ResponseItemFn, normalize_with};
use crate::lifecycle::Lifecycle;
use crate::pending::{Canceller, PendingSet};

/// Called with the payload and response of every successful call.
pub type CompletedFn<T> = Arc<dyn Fn(&T, &RawResponse) + Send + Sync>;

/// Called with the normalized error of every failed or cancelled call.
pub type ErrorFn = Arc<dyn Fn(&RequestError) + Send + Sync>;

type FactoryFn<Args, T> = dyn Fn(&Args) -> Request<T> + Send + Sync;

/// Per-requester callbacks and transport override.
pub struct RequestOptions<T> {
    /// Success callback.
    pub on_completed: Option<CompletedFn<T>>,
    /// Failure callback.
    pub on_error: Option<ErrorFn>,
    /// Transport used instead of the context's.
    pub transport: Option<Arc<dyn Transport>>,
}

impl<T> Default for RequestOptions<T> {
    fn default() -> Self {
        Self {
            on_completed: None,
            on_error: None,
            transport: None,
        }
    }
}

impl<T> Clone for RequestOptions<T> {
    fn clone(&self) -> Self {
        Self {
            on_completed: self.on_completed.clone(),
            on_error: self.on_error.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T> RequestOptions<T> {
    /// Sets the success callback.
    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &RawResponse) + Send + Sync + 'static,
    {
        self.on_completed = Some(Arc::new(f));
        self
    }

    /// Sets the failure callback.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Overrides the transport.
    pub fn transport<Tr>(mut self, transport: Tr) -> Self
    where
        Tr: Transport + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }
}

impl<T> fmt::Debug for RequestOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("on_completed", &self.on_completed.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("transport", &self.transport.as_ref().map(|t| t.name().to_string()))
            .finish()
    }
}

/// Everything a call needs after its description has been built.
struct Executor<T> {
    transport: Arc<dyn Transport>,
    normalizer: Option<ErrorNormalizer>,
    response_item: Option<ResponseItemFn>,
    on_completed: Option<CompletedFn<T>>,
    on_error: Option<ErrorFn>,
    pending: PendingSet,
    lifecycle: Lifecycle,
}

impl<T> Executor<T>
where
    T: DeserializeOwned,
{
    fn extract(&self, response: RawResponse) -> Result<(T, RawResponse), TransportFailure> {
        let payload = match &self.response_item {
            Some(extract) => extract(&response),
            None => response.data.clone(),
        };
        let data = serde_json::from_value(payload)
            .map_err(|err| TransportFailure::decode(err.to_string()))?;
        Ok((data, response))
    }

    async fn settle(
        &self,
        id: Option<u64>,
        config: RequestConfig,
        token: CancelToken,
    ) -> Result<(T, RawResponse), RequestError> {
        let url = config.target();
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(token.to_failure()),
            result = self.transport.invoke(config, token.clone()) => result,
        };
        if let Some(id) = id {
            self.pending.remove(id);
        }

        match outcome.and_then(|response| self.extract(response)) {
            Ok((data, response)) => {
                debug!(url = %url, status = %response.status, "request completed");
                if let Some(on_completed) = &self.on_completed {
                    on_completed(&data, &response);
                }
                Ok((data, response))
            }
            Err(failure) => {
                if failure.is_cancel() {
                    trace!(url = %url, reason = ?failure.message, "request cancelled");
                } else {
                    debug!(url = %url, error = %failure, "request failed");
                }
                let error = normalize_with(self.normalizer.as_ref(), Some(&failure));
                if let Some(on_error) = &self.on_error {
                    on_error(&error);
                }
                Err(error)
            }
        }
    }
}

struct RequesterInner<Args, T> {
    factory: Box<FactoryFn<Args, T>>,
    executor: Arc<Executor<T>>,
}

/// Builds calls from arguments and tracks the ones in flight.
///
/// Cloning is cheap; clones share the pending set and lifecycle.
pub struct Requester<Args, T> {
    inner: Arc<RequesterInner<Args, T>>,
}

impl<Args, T> Clone for Requester<Args, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Args, T> fmt::Debug for Requester<Args, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester")
            .field("transport", &self.inner.executor.transport.name())
            .field("pending", &self.inner.executor.pending.len())
            .field("active", &self.inner.executor.lifecycle.is_active())
            .finish()
    }
}

impl<Args, T> Requester<Args, T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Creates a requester using `context`.
    pub fn new<F>(context: &ContextConfig, factory: F) -> Self
    where
        F: Fn(&Args) -> Request<T> + Send + Sync + 'static,
    {
        Self::with_options(context, factory, RequestOptions::default())
    }

    /// Creates a requester with callbacks and an optional transport override.
    pub fn with_options<F>(
        context: &ContextConfig,
        factory: F,
        options: RequestOptions<T>,
    ) -> Self
    where
        F: Fn(&Args) -> Request<T> + Send + Sync + 'static,
    {
        Self::build(context, factory, options, Lifecycle::new())
    }

    pub(crate) fn build<F>(
        context: &ContextConfig,
        factory: F,
        options: RequestOptions<T>,
        lifecycle: Lifecycle,
    ) -> Self
    where
        F: Fn(&Args) -> Request<T> + Send + Sync + 'static,
    {
        let executor = Executor {
            transport: options
                .transport
                .unwrap_or_else(|| Arc::clone(&context.transport)),
            normalizer: context.error_normalizer.clone(),
            response_item: context.response_item.clone(),
            on_completed: options.on_completed,
            on_error: options.on_error,
            pending: PendingSet::default(),
            lifecycle,
        };
        Self {
            inner: Arc::new(RequesterInner {
                factory: Box::new(factory),
                executor: Arc::new(executor),
            }),
        }
    }

    /// Describes a call for `args`. Nothing is sent yet.
    pub fn call(&self, args: &Args) -> RequestHandle<T> {
        RequestHandle {
            request: (self.inner.factory)(args),
            source: CancelSource::new(),
            executor: Arc::clone(&self.inner.executor),
        }
    }

    /// Cancels every pending call.
    pub fn clear(&self, message: Option<&str>) {
        self.inner.executor.pending.cancel_all(message);
    }

    /// Returns `true` while any call is in flight.
    pub fn has_pending(&self) -> bool {
        !self.inner.executor.pending.is_empty()
    }

    /// Stops tracking new calls and cancels the pending ones. Idempotent.
    pub fn dispose(&self) {
        if self.inner.executor.lifecycle.dispose() {
            self.clear(None);
        }
    }

    /// The lifecycle this requester registers calls under.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.executor.lifecycle
    }
}

/// One described call.
pub struct RequestHandle<T> {
    request: Request<T>,
    source: CancelSource,
    executor: Arc<Executor<T>>,
}

impl<T> RequestHandle<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// The call's description.
    pub fn config(&self) -> &RequestConfig {
        self.request.config()
    }

    /// Cancels the call.
    pub fn cancel(&self, message: Option<&str>) {
        self.source.cancel(message);
    }

    /// A canceller for this call, usable after `ready` consumed the handle.
    pub fn canceller(&self) -> Canceller {
        Canceller::new(self.source.clone())
    }

    /// Sends the call and resolves once it settles.
    ///
    /// The call is registered as pending as soon as this method returns,
    /// before the future is first polled. Registration is skipped once the
    /// requester's lifecycle has been disposed.
    pub fn ready(
        self,
    ) -> impl Future<Output = Result<(T, RawResponse), RequestError>> + Send + 'static {
        let RequestHandle {
            request,
            source,
            executor,
        } = self;
        let id = executor
            .lifecycle
            .is_active()
            .then(|| executor.pending.insert(source.clone()));
        let token = source.token();
        async move { executor.settle(id, request.into_config(), token).await }
    }
}

impl<T> fmt::Debug for RequestHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("request", &self.request)
            .field("cancelled", &self.source.is_cancelled())
            .finish()
    }
}

/// A requester whose calls are a base config overlaid with per-call
/// overrides.
pub type Fetch<T> = Requester<RequestConfig, T>;

/// Creates a [`Fetch`] over `base`.
///
/// Each call merges its argument on top of `base`, field by field; pass
/// `RequestConfig::default()` to send `base` as is.
pub fn fetch<T>(context: &ContextConfig, base: RequestConfig) -> Fetch<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fetch_with_options(context, base, RequestOptions::default())
}

/// [`fetch`] with callbacks and an optional transport override.
pub fn fetch_with_options<T>(
    context: &ContextConfig,
    base: RequestConfig,
    options: RequestOptions<T>,
) -> Fetch<T>
where
    T: DeserializeOwned + Send + 'static,
{
    Requester::with_options(
        context,
        move |overlay: &RequestConfig| Request::new(base.merge(overlay)),
        options,
    )
}

/// Sends one call outside any requester.
///
/// No cancellation, no pending tracking, default error normalization.
pub async fn send<T>(
    transport: &dyn Transport,
    request: Request<T>,
) -> Result<(T, RawResponse), RequestError>
where
    T: DeserializeOwned,
{
    let response = transport
        .invoke(request.into_config(), CancelToken::never())
        .await?;
    let data = serde_json::from_value(response.data.clone())
        .map_err(|err| RequestError::from(TransportFailure::decode(err.to_string())))?;
    Ok((data, response))
}
