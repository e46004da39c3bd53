#![warn(missing_docs)]
//! # fetchbox-backend
//!
//! Cache storage for fetchbox.
//!
//! Every backend implements the synchronous [`Cache`] trait: `get`, `set`,
//! `delete` and `clear` over [`CacheKey`]s and JSON values. Two backends ship
//! with the crate:
//!
//! | Backend      | Expiry                         | Eviction |
//! |--------------|--------------------------------|----------|
//! | [`MapCache`] | never                          | never    |
//! | [`TtlCache`] | per entry, reset on every `set` | never    |
//!
//! A context does not hold a cache directly but a [`CacheSlot`], which is
//! either an enabled cache or [`CacheSlot::Disabled`]. A disabled slot never
//! calls into any cache.
//!
//! ## Configuration
//!
//! [`CachePolicy`] describes a slot in YAML:
//!
//! ```
//! use fetchbox_backend::CachePolicy;
//!
//! let policy = CachePolicy::from_yaml("Ttl:\n  ttl: 5m\n").unwrap();
//! assert!(policy.build().is_enabled());
//! ```
//!
//! [`CacheKey`]: fetchbox_core::CacheKey

pub mod cache;
pub mod error;
pub mod map;
pub mod policy;
pub mod ttl;

pub use cache::{Cache, CacheSlot};
pub use error::ConfigError;
pub use map::{MapCache, global_cache};
pub use policy::{CachePolicy, TtlConfig};
pub use ttl::{DEFAULT_TTL, TtlCache, TtlCacheBuilder};
