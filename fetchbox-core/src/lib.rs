#![warn(missing_docs)]
//! # fetchbox-core
//!
//! Core types shared by every fetchbox crate.
//!
//! This crate holds the pieces of the request pipeline that carry no runtime
//! state of their own:
//!
//! - **Describe** an HTTP call intent ([`RequestConfig`], [`Request`])
//! - **Identify** it in a cache ([`CacheKey`], [`derive_key`], [`KeySource`])
//! - **Normalize** failures into one shape ([`TransportFailure`], [`RequestError`])
//! - **Send** it through a pluggable client ([`Transport`], [`RawResponse`])
//! - **Cancel** it cooperatively ([`CancelSource`], [`CancelToken`])
//!
//! The executor and the resource coordinator built on top of these live in
//! the `fetchbox` crate; cache storage lives in `fetchbox-backend`.

pub mod cancel;
pub mod error;
pub mod key;
pub mod request;
pub mod transport;

pub use cancel::{CancelSource, CancelToken};
pub use error::{
    ErrorCode, ErrorNormalizer, FailureKind, FailureResponse, RequestError, TransportFailure,
    normalize,
};
pub use key::{CacheKey, KeyFn, KeySource, derive_key};
pub use request::{Request, RequestConfig, request};
pub use transport::{RawResponse, Transport};

#[doc(hidden)]
pub use smol_str::SmolStr;
