//! Cache key types and derivation.
//!
//! - [`CacheKey`] - an opaque text or numeric key
//! - [`derive_key`] - the default, content-addressed key for a [`RequestConfig`]
//! - [`KeySource`] - how a key is chosen for a call (derived, fixed or custom)
//!
//! ## Derived keys
//!
//! [`derive_key`] produces the same key for requests that differ only in
//! representation:
//!
//! - the method is lowercased (`GET` and `get` collide)
//! - exactly one leading and one trailing `/` is stripped from `url` and
//!   `base_url` independently
//! - object fields are compared regardless of insertion order
//!
//! Array order, header values, body and params stay significant.
//!
//! ```
//! use fetchbox_core::{RequestConfig, derive_key};
//! use http::Method;
//! use serde_json::json;
//!
//! let a = RequestConfig::new("/users/")
//!     .with_method(Method::GET)
//!     .with_params(json!({ "page": 1, "size": 10 }));
//! let b = RequestConfig::new("users")
//!     .with_method(Method::from_bytes(b"get").unwrap())
//!     .with_params(json!({ "size": 10, "page": 1 }));
//! assert_eq!(derive_key(&a), derive_key(&b));
//! ```

use std::fmt::{self, Write as _};
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use smol_str::SmolStr;

use crate::RequestConfig;

/// A key identifying one cached entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Text key. Derived keys are hex-encoded SHA-256 digests.
    Text(SmolStr),
    /// Numeric key, for callers that assign their own ids.
    Number(i64),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Text(text) => f.write_str(text),
            CacheKey::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        CacheKey::Text(SmolStr::new(value))
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        CacheKey::Text(SmolStr::from(value))
    }
}

impl From<i64> for CacheKey {
    fn from(value: i64) -> Self {
        CacheKey::Number(value)
    }
}

/// Custom key function.
pub type KeyFn = Arc<dyn Fn(&RequestConfig) -> CacheKey + Send + Sync>;

/// Chooses the cache key for a request.
#[derive(Clone, Default)]
pub enum KeySource {
    /// Use [`derive_key`].
    #[default]
    Derived,
    /// Always use this key, whatever the request.
    Fixed(CacheKey),
    /// Compute the key with a caller-supplied function.
    Custom(KeyFn),
}

impl KeySource {
    /// Wraps a closure as [`KeySource::Custom`].
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RequestConfig) -> CacheKey + Send + Sync + 'static,
    {
        KeySource::Custom(Arc::new(f))
    }

    /// Returns the key for `config`.
    pub fn key_for(&self, config: &RequestConfig) -> CacheKey {
        match self {
            KeySource::Derived => derive_key(config),
            KeySource::Fixed(key) => key.clone(),
            KeySource::Custom(f) => f(config),
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Derived => f.write_str("Derived"),
            KeySource::Fixed(key) => f.debug_tuple("Fixed").field(key).finish(),
            KeySource::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<CacheKey> for KeySource {
    fn from(key: CacheKey) -> Self {
        KeySource::Fixed(key)
    }
}

/// Derives the default cache key for `config`.
///
/// The identifying fields are written in a canonical JSON form (object keys
/// sorted, arrays in order) and hashed with SHA-256.
pub fn derive_key(config: &RequestConfig) -> CacheKey {
    let method = config
        .method
        .as_ref()
        .map(|method| Value::String(method.as_str().to_ascii_lowercase()));
    let headers = Value::Object(config.headers.clone());

    let fields: [(&str, Option<Value>); 6] = [
        ("url", config.url.as_deref().map(trim_slashes)),
        ("method", method),
        ("baseURL", config.base_url.as_deref().map(trim_slashes)),
        ("headers", Some(headers)),
        ("data", config.data.clone()),
        ("params", config.params.clone()),
    ];

    let mut canonical = String::new();
    canonical.push('{');
    for (i, (name, value)) in fields.iter().enumerate() {
        if i > 0 {
            canonical.push(',');
        }
        write_canonical(&mut canonical, &Value::String((*name).to_string()));
        canonical.push(':');
        write_canonical(&mut canonical, value.as_ref().unwrap_or(&Value::Null));
    }
    canonical.push('}');

    let digest = Sha256::digest(canonical.as_bytes());
    CacheKey::Text(SmolStr::from(hex::encode(digest)))
}

fn trim_slashes(path: &str) -> Value {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    Value::String(path.to_string())
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (name, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, &Value::String(name.clone()));
                out.push(':');
                write_canonical(out, item);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => {
            // Display on a scalar Value is its JSON encoding.
            let _ = write!(out, "{scalar}");
        }
    }
}
