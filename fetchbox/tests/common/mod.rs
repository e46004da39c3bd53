//! Shared test helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fetchbox::{ContextConfig, RequestState, Resource};
use fetchbox_backend::MapCache;
use fetchbox_core::{CancelToken, RawResponse, RequestConfig, Transport, TransportFailure};
use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

type Handler = Arc<dyn Fn(&RequestConfig) -> Result<RawResponse, TransportFailure> + Send + Sync>;

#[derive(Default)]
struct MockInner {
    routes: Mutex<HashMap<String, Handler>>,
    calls: Mutex<Vec<RequestConfig>>,
    delays: Mutex<HashMap<String, Duration>>,
}

/// Programmable in-memory transport.
///
/// Routes are matched on `RequestConfig::url`. Unknown routes answer 404.
/// A delay, if set, is raced against the cancel token.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `url` with `200` and `body`.
    pub fn reply(&self, url: &str, body: Value) -> &Self {
        self.reply_with(url, move |_| Ok(RawResponse::ok(body.clone())))
    }

    /// Answers `url` with an unsuccessful status.
    pub fn reply_status(&self, url: &str, status: StatusCode, body: Option<Value>) -> &Self {
        self.reply_with(url, move |_| {
            Err(TransportFailure::status(status, body.clone()))
        })
    }

    /// Fails `url` with `failure`.
    pub fn fail(&self, url: &str, failure: TransportFailure) -> &Self {
        self.reply_with(url, move |_| Err(failure.clone()))
    }

    /// Answers `url` with a custom handler.
    pub fn reply_with<F>(&self, url: &str, handler: F) -> &Self
    where
        F: Fn(&RequestConfig) -> Result<RawResponse, TransportFailure> + Send + Sync + 'static,
    {
        self.inner
            .routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Arc::new(handler));
        self
    }

    /// Holds every answer for `url` back by `delay`.
    pub fn delay(&self, url: &str, delay: Duration) -> &Self {
        self.inner
            .delays
            .lock()
            .unwrap()
            .insert(url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<RequestConfig> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    /// A context using this transport and a private cache.
    pub fn context(&self) -> ContextConfig {
        ContextConfig::builder()
            .transport(self.clone())
            .cache_backend(MapCache::new())
            .build()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn invoke(
        &self,
        config: RequestConfig,
        token: CancelToken,
    ) -> Result<RawResponse, TransportFailure> {
        let url = config.url.clone().unwrap_or_default();
        self.inner.calls.lock().unwrap().push(config.clone());

        let delay = self.inner.delays.lock().unwrap().get(&url).copied();
        if let Some(delay) = delay {
            tokio::select! {
                _ = token.cancelled() => return Err(token.to_failure()),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let handler = self.inner.routes.lock().unwrap().get(&url).cloned();
        match handler {
            Some(handler) => handler(&config),
            None => Err(TransportFailure::status(StatusCode::NOT_FOUND, None)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Waits until the resource is not loading and returns that state.
pub async fn settled<Args, T>(resource: &Resource<Args, T>) -> RequestState<T>
where
    Args: Clone + PartialEq + Default + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let mut updates = resource.subscribe();
    let state = updates
        .wait_for(|state| !state.is_loading)
        .await
        .expect("resource state channel closed")
        .clone();
    state
}

/// Lets spawned settlement tasks run.
pub async fn flush() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
