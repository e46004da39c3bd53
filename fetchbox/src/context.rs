//! Ambient configuration.
//!
//! A [`ContextConfig`] bundles what requesters and resources share: the
//! transport, the cache, how keys are chosen, which calls are cacheable,
//! how errors are normalized and how the payload is picked out of a
//! response. It is passed explicitly to constructors; nested scopes derive a
//! new config with [`ContextConfig::scoped`], where every field set on the
//! [`ContextOverride`] wins.
//!
//! ```
//! use fetchbox::{ContextConfig, ContextOverride};
//! use fetchbox_backend::CacheSlot;
//!
//! let app = ContextConfig::global();
//! let uncached = app.scoped(&ContextOverride::default().cache(CacheSlot::Disabled));
//! assert!(!uncached.cache.is_enabled());
//! assert!(app.cache.is_enabled());
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use fetchbox_backend::{Cache, CacheSlot, global_cache};
use fetchbox_core::{
    CancelToken, ErrorNormalizer, KeySource, RawResponse, RequestConfig, RequestError,
    Transport, TransportFailure,
};
use serde_json::Value;

/// Decides whether a call is cacheable. Replaces the GET rule when set.
pub type CacheFilter = Arc<dyn Fn(&RequestConfig) -> bool + Send + Sync>;

/// Picks the payload out of a response. Defaults to the response body.
pub type ResponseItemFn = Arc<dyn Fn(&RawResponse) -> Value + Send + Sync>;

/// Transport used when none has been configured. Every call fails.
#[derive(Debug, Default)]
pub struct Unconfigured;

#[async_trait]
impl Transport for Unconfigured {
    async fn invoke(
        &self,
        config: RequestConfig,
        _token: CancelToken,
    ) -> Result<RawResponse, TransportFailure> {
        Err(TransportFailure::other(format!(
            "no transport configured for {}",
            config.target()
        )))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

/// Configuration shared by requesters and resources.
#[derive(Clone)]
pub struct ContextConfig {
    /// Transport performing the calls.
    pub transport: Arc<dyn Transport>,
    /// Cache for successful payloads.
    pub cache: CacheSlot,
    /// How cache keys are chosen.
    pub cache_key: KeySource,
    /// Cacheability override.
    pub cache_filter: Option<CacheFilter>,
    /// Replaces the default error normalization.
    pub error_normalizer: Option<ErrorNormalizer>,
    /// Payload extractor.
    pub response_item: Option<ResponseItemFn>,
}

static GLOBAL: OnceLock<ContextConfig> = OnceLock::new();

impl ContextConfig {
    /// Creates a config using `transport` and the process-wide cache.
    pub fn new<T>(transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self::builder().transport(transport).build()
    }

    /// Returns a builder starting from the defaults.
    pub fn builder() -> ContextConfigBuilder {
        ContextConfigBuilder::default()
    }

    /// The process-wide default config.
    ///
    /// It uses [`global_cache`], derived keys and an [`Unconfigured`]
    /// transport; scope it with a real transport before issuing calls.
    pub fn global() -> ContextConfig {
        GLOBAL.get_or_init(|| Self::builder().build()).clone()
    }

    /// Derives a nested config. Fields set on `overrides` win.
    pub fn scoped(&self, overrides: &ContextOverride) -> ContextConfig {
        ContextConfig {
            transport: overrides
                .transport
                .clone()
                .unwrap_or_else(|| Arc::clone(&self.transport)),
            cache: overrides.cache.clone().unwrap_or_else(|| self.cache.clone()),
            cache_key: overrides
                .cache_key
                .clone()
                .unwrap_or_else(|| self.cache_key.clone()),
            cache_filter: overrides
                .cache_filter
                .clone()
                .or_else(|| self.cache_filter.clone()),
            error_normalizer: overrides
                .error_normalizer
                .clone()
                .or_else(|| self.error_normalizer.clone()),
            response_item: overrides
                .response_item
                .clone()
                .or_else(|| self.response_item.clone()),
        }
    }

    /// Returns a copy using `normalizer` for every failure.
    pub fn with_error_normalizer<F>(self, normalizer: F) -> Self
    where
        F: Fn(Option<&TransportFailure>) -> RequestError + Send + Sync + 'static,
    {
        Self {
            error_normalizer: Some(Arc::new(normalizer)),
            ..self
        }
    }

    /// Normalizes `failure` with the configured normalizer.
    pub fn normalize(&self, failure: Option<&TransportFailure>) -> RequestError {
        normalize_with(self.error_normalizer.as_ref(), failure)
    }
}

/// Runs `normalizer`, or the default normalization when there is none.
pub(crate) fn normalize_with(
    normalizer: Option<&ErrorNormalizer>,
    failure: Option<&TransportFailure>,
) -> RequestError {
    match normalizer {
        Some(normalizer) => normalizer(failure),
        None => fetchbox_core::normalize(failure),
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextConfig")
            .field("transport", &self.transport.name())
            .field("cache", &self.cache)
            .field("cache_key", &self.cache_key)
            .field("cache_filter", &self.cache_filter.is_some())
            .field("error_normalizer", &self.error_normalizer.is_some())
            .field("response_item", &self.response_item.is_some())
            .finish()
    }
}

/// Builder for [`ContextConfig`].
#[derive(Default)]
pub struct ContextConfigBuilder {
    overrides: ContextOverride,
}

impl ContextConfigBuilder {
    /// Sets the transport.
    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.overrides.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the cache slot.
    pub fn cache(mut self, cache: CacheSlot) -> Self {
        self.overrides.cache = Some(cache);
        self
    }

    /// Uses `cache` as an enabled cache.
    pub fn cache_backend<C>(self, cache: C) -> Self
    where
        C: Cache + 'static,
    {
        self.cache(CacheSlot::enabled(cache))
    }

    /// Sets how cache keys are chosen.
    pub fn cache_key(mut self, cache_key: impl Into<KeySource>) -> Self {
        self.overrides.cache_key = Some(cache_key.into());
        self
    }

    /// Sets the cacheability filter.
    pub fn cache_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&RequestConfig) -> bool + Send + Sync + 'static,
    {
        self.overrides.cache_filter = Some(Arc::new(filter));
        self
    }

    /// Sets the error normalizer.
    pub fn error_normalizer<F>(mut self, normalizer: F) -> Self
    where
        F: Fn(Option<&TransportFailure>) -> RequestError + Send + Sync + 'static,
    {
        self.overrides.error_normalizer = Some(Arc::new(normalizer));
        self
    }

    /// Sets the payload extractor.
    pub fn response_item<F>(mut self, extract: F) -> Self
    where
        F: Fn(&RawResponse) -> Value + Send + Sync + 'static,
    {
        self.overrides.response_item = Some(Arc::new(extract));
        self
    }

    /// Builds the config. Unset fields take the defaults: no transport, the
    /// global cache and derived keys.
    pub fn build(self) -> ContextConfig {
        let ContextOverride {
            transport,
            cache,
            cache_key,
            cache_filter,
            error_normalizer,
            response_item,
        } = self.overrides;
        ContextConfig {
            transport: transport.unwrap_or_else(|| Arc::new(Unconfigured)),
            cache: cache.unwrap_or_else(|| CacheSlot::Enabled(global_cache())),
            cache_key: cache_key.unwrap_or_default(),
            cache_filter,
            error_normalizer,
            response_item,
        }
    }
}

/// Per-scope overrides of a [`ContextConfig`]. `None` inherits.
#[derive(Clone, Default)]
pub struct ContextOverride {
    /// Transport override.
    pub transport: Option<Arc<dyn Transport>>,
    /// Cache override. `Some(CacheSlot::Disabled)` switches caching off.
    pub cache: Option<CacheSlot>,
    /// Key source override.
    pub cache_key: Option<KeySource>,
    /// Cacheability filter override.
    pub cache_filter: Option<CacheFilter>,
    /// Error normalizer override.
    pub error_normalizer: Option<ErrorNormalizer>,
    /// Payload extractor override.
    pub response_item: Option<ResponseItemFn>,
}

impl ContextOverride {
    /// Overrides the transport.
    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Overrides the cache slot.
    pub fn cache(mut self, cache: CacheSlot) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Overrides the key source.
    pub fn cache_key(mut self, cache_key: impl Into<KeySource>) -> Self {
        self.cache_key = Some(cache_key.into());
        self
    }

    /// Overrides the cacheability filter.
    pub fn cache_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&RequestConfig) -> bool + Send + Sync + 'static,
    {
        self.cache_filter = Some(Arc::new(filter));
        self
    }

    /// Overrides the error normalizer.
    pub fn error_normalizer<F>(mut self, normalizer: F) -> Self
    where
        F: Fn(Option<&TransportFailure>) -> RequestError + Send + Sync + 'static,
    {
        self.error_normalizer = Some(Arc::new(normalizer));
        self
    }

    /// Overrides the payload extractor.
    pub fn response_item<F>(mut self, extract: F) -> Self
    where
        F: Fn(&RawResponse) -> Value + Send + Sync + 'static,
    {
        self.response_item = Some(Arc::new(extract));
        self
    }
}

impl fmt::Debug for ContextOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOverride")
            .field("transport", &self.transport.as_ref().map(|t| t.name().to_string()))
            .field("cache", &self.cache)
            .field("cache_key", &self.cache_key)
            .field("cache_filter", &self.cache_filter.is_some())
            .field("error_normalizer", &self.error_normalizer.is_some())
            .field("response_item", &self.response_item.is_some())
            .finish()
    }
}
