//! Declarative resources.
//!
//! A [`Resource`] owns a [`Requester`] and a [`RequestState`], and keeps the
//! state in step with the calls it makes:
//!
//! - at most one call is reflected in state at a time; starting a call
//!   cancels the ones still in flight
//! - successful payloads of cacheable calls are written to the cache, and a
//!   new resource seeds its data from a cache hit
//! - cancelled calls never set `error`
//! - once disposed, nothing changes state or cache anymore
//!
//! ```ignore
//! let users = Resource::new(
//!     &context,
//!     |page: &u32| request::<Vec<User>>(RequestConfig::get("/users").with_params(json!({ "page": page }))),
//!     Params::Auto(1),
//! );
//! let mut updates = users.subscribe();
//! updates.changed().await?;
//!
//! users.watch(Params::Auto(2)); // parameters changed: fetch page 2
//! ```
//!
//! Calls settle on spawned tokio tasks, so a resource must be created and
//! driven from within a tokio runtime.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fetchbox_backend::{Cache, CacheSlot};
use fetchbox_core::{CacheKey, KeySource, RawResponse, Request, RequestConfig, RequestError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{Instrument, debug, debug_span, trace, warn};

use crate::context::{CacheFilter, ContextConfig, ContextOverride};
use crate::lifecycle::Lifecycle;
use crate::pending::Canceller;
use crate::request::{CompletedFn, ErrorFn, RequestOptions, Requester};
use crate::state::{Action, RequestState, reduce};

/// Message given to calls cancelled because a newer call started.
pub const SUPERSEDED_MESSAGE: &str = "A new request has been made before completing the last one";

/// Decides from the arguments whether an automatic or refresh call may run.
pub type FilterFn<Args> = Arc<dyn Fn(&Args) -> bool + Send + Sync>;

/// The parameters a resource watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Params<Args> {
    /// Fetch with these arguments now and whenever they change.
    Auto(Args),
    /// Only fetch on [`Resource::dispatch`].
    Manual,
    /// Automatic fetching explicitly switched off.
    Off,
}

impl<Args> Params<Args> {
    /// The arguments, for [`Params::Auto`].
    pub fn args(&self) -> Option<&Args> {
        match self {
            Params::Auto(args) => Some(args),
            Params::Manual | Params::Off => None,
        }
    }
}

/// Options for [`Resource::with_options`].
pub struct ResourceOptions<Args, T> {
    /// Context overrides for this resource only.
    pub context: ContextOverride,
    /// Gate for automatic and refresh calls.
    pub filter: Option<FilterFn<Args>>,
    /// Data to start with when the cache has nothing.
    pub default_state: Option<T>,
    /// Success callback.
    pub on_completed: Option<CompletedFn<T>>,
    /// Failure callback, also called for cancellations.
    pub on_error: Option<ErrorFn>,
}

impl<Args, T> Default for ResourceOptions<Args, T> {
    fn default() -> Self {
        Self {
            context: ContextOverride::default(),
            filter: None,
            default_state: None,
            on_completed: None,
            on_error: None,
        }
    }
}

impl<Args, T> ResourceOptions<Args, T> {
    /// Overrides the cache slot.
    pub fn cache(mut self, cache: CacheSlot) -> Self {
        self.context.cache = Some(cache);
        self
    }

    /// Overrides the cacheability filter.
    pub fn cache_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&RequestConfig) -> bool + Send + Sync + 'static,
    {
        self.context.cache_filter = Some(Arc::new(filter));
        self
    }

    /// Overrides how the cache key is chosen.
    pub fn cache_key(mut self, cache_key: impl Into<KeySource>) -> Self {
        self.context.cache_key = Some(cache_key.into());
        self
    }

    /// Overrides the whole context.
    pub fn context(mut self, context: ContextOverride) -> Self {
        self.context = context;
        self
    }

    /// Sets the argument filter.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Args) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sets the initial data.
    pub fn default_state(mut self, data: T) -> Self {
        self.default_state = Some(data);
        self
    }

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
}

impl<Args, T> fmt::Debug for ResourceOptions<Args, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOptions")
            .field("context", &self.context)
            .field("filter", &self.filter.is_some())
            .field("default_state", &self.default_state.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type CacheTarget = (Arc<dyn Cache>, CacheKey);

struct ResourceInner<Args, T> {
    requester: Requester<Args, T>,
    state: watch::Sender<RequestState<T>>,
    generation: AtomicU64,
    params: Mutex<Params<Args>>,
    last_args: Mutex<Option<Args>>,
    filter: Option<FilterFn<Args>>,
    cache: CacheSlot,
    cache_filter: Option<CacheFilter>,
    cache_key: KeySource,
    lifecycle: Lifecycle,
}

impl<Args, T> ResourceInner<Args, T>
where
    Args: Clone + PartialEq + Default + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn passes(&self, args: &Args) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(args))
    }

    fn cache_target(&self, config: &RequestConfig) -> Option<CacheTarget> {
        let cache = self.cache.cache()?;
        let cacheable = match &self.cache_filter {
            Some(filter) => filter(config),
            None => config.is_get(),
        };
        cacheable.then(|| (Arc::clone(cache), self.cache_key.key_for(config)))
    }

    fn cached(&self, args: &Args) -> Option<T> {
        let handle = self.requester.call(args);
        let (cache, key) = self.cache_target(handle.config())?;
        let Some(value) = cache.get(&key) else {
            trace!(key = %key, "cache miss");
            return None;
        };
        match serde_json::from_value(value) {
            Ok(data) => {
                debug!(key = %key, "cache hit");
                Some(data)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "cached value does not match payload type");
                None
            }
        }
    }

    /// Starts a new generation, applying `action` to the state in the same
    /// step. Settlements of older generations are ignored from here on.
    fn advance(&self, action: Action<T>) -> u64 {
        let mut generation = 0;
        self.state.send_if_modified(|state| {
            generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            if !self.lifecycle.is_active() {
                return false;
            }
            *state = reduce(state, action);
            true
        });
        generation
    }

    /// Applies `action` if `generation` is still current and the resource
    /// is alive.
    fn apply(&self, generation: u64, action: Action<T>) -> bool {
        self.state.send_if_modified(|state| {
            if !self.lifecycle.is_active() {
                trace!(generation, "update after dispose dropped");
                return false;
            }
            if self.generation.load(Ordering::Acquire) != generation {
                trace!(generation, "superseded update dropped");
                return false;
            }
            *state = reduce(state, action);
            true
        })
    }

    fn trigger(self: &Arc<Self>, args: &Args) -> Canceller {
        *lock(&self.last_args) = Some(args.clone());

        let generation = self.advance(Action::Start);
        self.requester.clear(Some(SUPERSEDED_MESSAGE));

        let handle = self.requester.call(args);
        let target = self.cache_target(handle.config());
        let canceller = handle.canceller();
        let span = debug_span!(
            "fetchbox.resource",
            generation,
            url = %handle.config().target(),
            cached = target.is_some(),
        );
        let ready = handle.ready();

        let inner = Arc::clone(self);
        tokio::spawn(
            async move {
                let outcome = ready.await;
                inner.settle(generation, target, outcome);
            }
            .instrument(span),
        );
        canceller
    }

    fn settle(
        &self,
        generation: u64,
        target: Option<CacheTarget>,
        outcome: Result<(T, RawResponse), RequestError>,
    ) {
        match outcome {
            Ok((data, response)) => {
                let payload = target.as_ref().map(|_| serde_json::to_value(&data));
                if !self.apply(generation, Action::Success { data, response }) {
                    return;
                }
                if let (Some((cache, key)), Some(payload)) = (target, payload) {
                    match payload {
                        Ok(value) => {
                            trace!(key = %key, "cache write");
                            cache.set(key, value);
                        }
                        Err(err) => warn!(key = %key, error = %err, "payload is not cacheable"),
                    }
                }
            }
            Err(error) if error.is_cancel => {
                self.apply(generation, Action::Reset);
            }
            Err(error) => {
                self.apply(generation, Action::Error(error));
            }
        }
    }

    fn abandon(&self, message: Option<&str>) {
        self.advance(Action::Reset);
        self.requester.clear(message);
    }
}

/// A watched, cached, cancellable request.
///
/// Dropping the resource disposes it.
pub struct Resource<Args, T>
where
    Args: Clone + PartialEq + Default + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    inner: Arc<ResourceInner<Args, T>>,
}

impl<Args, T> Resource<Args, T>
where
    Args: Clone + PartialEq + Default + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates a resource using `context`.
    ///
    /// With [`Params::Auto`] the first call starts immediately.
    pub fn new<F>(context: &ContextConfig, factory: F, params: Params<Args>) -> Self
    where
        F: Fn(&Args) -> Request<T> + Send + Sync + 'static,
    {
        Self::with_options(context, factory, params, ResourceOptions::default())
    }

    /// Creates a resource with options.
    ///
    /// Initial data is a cache hit for the initial arguments if there is one,
    /// else `options.default_state`. Without [`Params::Auto`], the cache is
    /// probed with `Args::default()`.
    pub fn with_options<F>(
        context: &ContextConfig,
        factory: F,
        params: Params<Args>,
        options: ResourceOptions<Args, T>,
    ) -> Self
    where
        F: Fn(&Args) -> Request<T> + Send + Sync + 'static,
    {
        let ResourceOptions {
            context: overrides,
            filter,
            default_state,
            on_completed,
            on_error,
        } = options;
        let context = context.scoped(&overrides);
        let lifecycle = Lifecycle::new();
        let requester = Requester::build(
            &context,
            factory,
            RequestOptions {
                on_completed,
                on_error,
                transport: None,
            },
            lifecycle.clone(),
        );

        let inner = Arc::new(ResourceInner {
            requester,
            state: watch::Sender::new(RequestState::default()),
            generation: AtomicU64::new(0),
            params: Mutex::new(params.clone()),
            last_args: Mutex::new(None),
            filter,
            cache: context.cache,
            cache_filter: context.cache_filter,
            cache_key: context.cache_key,
            lifecycle,
        });

        let probe = params.args().cloned().unwrap_or_default();
        let data = inner.cached(&probe).or(default_state);
        inner.state.send_replace(RequestState::with_data(data));

        if let Params::Auto(args) = &params {
            if inner.passes(args) {
                inner.trigger(args);
            }
        }

        Self { inner }
    }

    /// Updates the watched parameters.
    ///
    /// When they differ from the previous ones and are [`Params::Auto`] with
    /// arguments passing the filter, a call starts and its canceller is
    /// returned. A change that starts nothing abandons in-flight calls.
    pub fn watch(&self, params: Params<Args>) -> Option<Canceller> {
        if !self.inner.lifecycle.is_active() {
            return None;
        }
        {
            let mut current = lock(&self.inner.params);
            if *current == params {
                return None;
            }
            *current = params.clone();
        }

        match params {
            Params::Auto(args) if self.inner.passes(&args) => Some(self.inner.trigger(&args)),
            _ => {
                if self.inner.requester.has_pending() {
                    self.inner.abandon(Some(SUPERSEDED_MESSAGE));
                }
                None
            }
        }
    }

    /// Starts a call with `args`, bypassing the filter.
    ///
    /// After [`dispose`](Self::dispose) this does nothing and returns a
    /// no-op canceller.
    pub fn dispatch(&self, args: Args) -> Canceller {
        if !self.inner.lifecycle.is_active() {
            trace!("dispatch after dispose ignored");
            return Canceller::noop();
        }
        self.inner.trigger(&args)
    }

    /// Repeats the last call.
    ///
    /// Uses the watched [`Params::Auto`] arguments, else the last dispatched
    /// ones. Returns `None` when there is nothing to repeat, the filter
    /// rejects the arguments or the resource is disposed.
    pub fn refresh(&self) -> Option<Canceller> {
        if !self.inner.lifecycle.is_active() {
            return None;
        }
        let args = lock(&self.inner.params)
            .args()
            .cloned()
            .or_else(|| lock(&self.inner.last_args).clone())?;
        if !self.inner.passes(&args) {
            return None;
        }
        Some(self.inner.trigger(&args))
    }

    /// Cancels in-flight calls and stops loading. `error` is cleared, `data`
    /// is kept.
    pub fn cancel(&self, message: Option<&str>) {
        self.inner.abandon(message);
    }

    /// Disposes the resource: in-flight calls are cancelled and no later
    /// settlement, dispatch or cache write has any effect. Idempotent.
    pub fn dispose(&self) {
        if self.inner.lifecycle.is_active() {
            debug!("resource disposed");
        }
        self.inner.requester.dispose();
    }

    /// Returns `true` until [`dispose`](Self::dispose).
    pub fn is_active(&self) -> bool {
        self.inner.lifecycle.is_active()
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> RequestState<T> {
        self.inner.state.borrow().clone()
    }

    /// A receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.inner.state.subscribe()
    }

    /// Returns `true` while a call is in flight.
    pub fn has_pending(&self) -> bool {
        self.inner.requester.has_pending()
    }
}

impl<Args, T> Drop for Resource<Args, T>
where
    Args: Clone + PartialEq + Default + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<Args, T> fmt::Debug for Resource<Args, T>
where
    Args: Clone + PartialEq + Default + Send + Sync + fmt::Debug + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("params", &*lock(&self.inner.params))
            .field("state", &*self.inner.state.borrow())
            .field("active", &self.inner.lifecycle.is_active())
            .finish()
    }
}
