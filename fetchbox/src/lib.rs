#![warn(missing_docs)]
//! # fetchbox
//!
//! Declarative, cancellable and cached HTTP resources for tokio applications.
//!
//! fetchbox sits between application code and an HTTP client. The client is
//! plugged in as a [`Transport`]; fetchbox adds:
//!
//! - **Cancellation**: every call runs under its own token and can be
//!   cancelled cooperatively ([`Canceller`])
//! - **At most one visible call per resource**: starting a call cancels the
//!   previous one, and late results of superseded calls are dropped
//! - **Caching**: successful payloads of GET calls (or whatever the cache
//!   filter admits) are stored under a content-derived [`CacheKey`]; new
//!   resources start from a cache hit
//! - **A small state machine**: [`RequestState`] moves between idle,
//!   loading, success and error through [`reduce`]
//!
//! ## Building blocks
//!
//! | Type | Role |
//! |------|------|
//! | [`ContextConfig`] | transport, cache, key source, filters and error normalizer shared by a scope |
//! | [`Requester`] | turns arguments into calls and tracks the ones in flight |
//! | [`Resource`] | a watched request with state, cache and cancellation |
//! | [`Lifecycle`] | the "still alive" flag guarding state updates |
//!
//! ## Example
//!
//! ```ignore
//! use fetchbox::{ContextConfig, Params, RequestConfig, Resource};
//! use fetchbox_core::request;
//! use fetchbox_reqwest::ReqwestTransport;
//!
//! let context = ContextConfig::new(ReqwestTransport::new(reqwest::Client::new()));
//! let user = Resource::new(
//!     &context,
//!     |id: &u64| request::<User>(RequestConfig::get(format!("https://api.example.com/users/{id}"))),
//!     Params::Auto(42),
//! );
//!
//! let mut updates = user.subscribe();
//! while updates.changed().await.is_ok() {
//!     let state = updates.borrow().clone();
//!     if !state.is_loading {
//!         println!("{:?} {:?}", state.data, state.error);
//!         break;
//!     }
//! }
//! ```
//!
//! [`CacheKey`]: fetchbox_core::CacheKey

pub mod context;
pub mod lifecycle;
pub mod pending;
pub mod request;
pub mod resource;
pub mod state;

pub use context::{
    CacheFilter, ContextConfig, ContextConfigBuilder, ContextOverride, ResponseItemFn,
    Unconfigured,
};
pub use lifecycle::Lifecycle;
pub use pending::Canceller;
pub use request::{
    CompletedFn, ErrorFn, Fetch, RequestHandle, RequestOptions, Requester, fetch,
    fetch_with_options, send,
};
pub use resource::{FilterFn, Params, Resource, ResourceOptions, SUPERSEDED_MESSAGE};
pub use state::{Action, RequestState, reduce};

pub use fetchbox_core::{
    CacheKey, KeySource, RawResponse, Request, RequestConfig, RequestError, Transport,
    TransportFailure,
};
