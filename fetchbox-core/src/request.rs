//! Request descriptions.
//!
//! A [`RequestConfig`] describes one HTTP call intent as plain data: target,
//! method, headers, query parameters and body. It never performs I/O; a
//! [`Transport`](crate::Transport) turns it into an actual network call.
//!
//! [`Request<T>`] wraps a config with a zero-sized payload marker so the
//! expected response type travels with the description:
//!
//! ```
//! use fetchbox_core::{Request, RequestConfig, request};
//! use serde_json::json;
//!
//! #[derive(serde::Deserialize)]
//! struct User {
//!     id: String,
//! }
//!
//! let req: Request<User> = request(
//!     RequestConfig::get("/users")
//!         .with_base_url("https://example.com")
//!         .with_params(json!({ "page": 2 })),
//! );
//! assert_eq!(req.target(), "https://example.com/users");
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use http::Method;
use serde_json::{Map, Value};

/// An immutable description of one HTTP call.
///
/// Fields are public plain data. The `with_*` methods consume the config and
/// return an updated copy, so a value handed to the pipeline is never
/// mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    /// Request target, absolute or relative to `base_url`.
    pub url: Option<String>,
    /// HTTP method. `None` means the transport default (GET).
    pub method: Option<Method>,
    /// Base URL joined in front of a relative `url`.
    pub base_url: Option<String>,
    /// Request headers.
    pub headers: Map<String, Value>,
    /// Query parameters.
    pub params: Option<Value>,
    /// Request body.
    pub data: Option<Value>,
}

impl RequestConfig {
    /// Creates a config targeting `url` with no method set.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Creates a `GET` config targeting `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url).with_method(Method::GET)
    }

    /// Creates a `POST` config targeting `url`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(url).with_method(Method::POST)
    }

    /// Sets the target URL.
    pub fn with_url(self, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..self
        }
    }

    /// Sets the HTTP method.
    pub fn with_method(self, method: Method) -> Self {
        Self {
            method: Some(method),
            ..self
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..self
        }
    }

    /// Adds a header, replacing a previous value with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the query parameters.
    pub fn with_params(self, params: impl Into<Value>) -> Self {
        Self {
            params: Some(params.into()),
            ..self
        }
    }

    /// Sets the request body.
    pub fn with_data(self, data: impl Into<Value>) -> Self {
        Self {
            data: Some(data.into()),
            ..self
        }
    }

    /// Returns `true` when the method is absent or equals `GET` ignoring case.
    pub fn is_get(&self) -> bool {
        self.method
            .as_ref()
            .is_none_or(|method| method.as_str().eq_ignore_ascii_case("GET"))
    }

    /// Joins `base_url` and `url` into the final request target.
    ///
    /// Absolute URLs (with a scheme) ignore the base.
    pub fn target(&self) -> String {
        let url = self.url.as_deref().unwrap_or_default();
        match self.base_url.as_deref() {
            Some(base) if !is_absolute(url) => {
                if url.is_empty() {
                    base.to_string()
                } else {
                    format!(
                        "{}/{}",
                        base.trim_end_matches('/'),
                        url.trim_start_matches('/')
                    )
                }
            }
            _ => url.to_string(),
        }
    }

    /// Overlays `other` on top of `self`.
    ///
    /// Fields set in `other` win; headers are merged with `other` winning on
    /// name collisions.
    pub fn merge(&self, other: &RequestConfig) -> RequestConfig {
        let mut headers = self.headers.clone();
        for (name, value) in &other.headers {
            headers.insert(name.clone(), value.clone());
        }
        RequestConfig {
            url: other.url.clone().or_else(|| self.url.clone()),
            method: other.method.clone().or_else(|| self.method.clone()),
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            headers,
            params: other.params.clone().or_else(|| self.params.clone()),
            data: other.data.clone().or_else(|| self.data.clone()),
        }
    }
}

fn is_absolute(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// A [`RequestConfig`] tagged with the payload type `T` it is expected to
/// produce.
///
/// The marker is purely static: it carries no runtime data and `T` needs no
/// bounds to build, clone or inspect the request.
pub struct Request<T> {
    config: RequestConfig,
    payload: PhantomData<fn() -> T>,
}

/// Tags `config` with the payload type `T`.
pub fn request<T>(config: RequestConfig) -> Request<T> {
    Request::new(config)
}

impl<T> Request<T> {
    /// Wraps a config.
    pub fn new(config: RequestConfig) -> Self {
        Self {
            config,
            payload: PhantomData,
        }
    }

    /// Returns the untyped config.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Unwraps the untyped config.
    pub fn into_config(self) -> RequestConfig {
        self.config
    }
}

impl<T> Deref for Request<T> {
    type Target = RequestConfig;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}

impl<T> Clone for Request<T> {
    fn clone(&self) -> Self {
        Self::new(self.config.clone())
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("config", &self.config)
            .field("payload", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> PartialEq for Request<T> {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
    }
}

impl<T> From<RequestConfig> for Request<T> {
    fn from(config: RequestConfig) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_keeps_config_untouched() {
        let config = RequestConfig::get("/config2").with_params(json!({ "page": 2, "size": 10 }));
        let req: Request<Vec<u32>> = request(config.clone());
        assert_eq!(req.config(), &config);
        assert_eq!(req.into_config(), config);
    }

    #[test]
    fn target_joins_base_and_url() {
        let config = RequestConfig::new("/users").with_base_url("https://example.com/");
        assert_eq!(config.target(), "https://example.com/users");

        let config = RequestConfig::new("users").with_base_url("https://example.com");
        assert_eq!(config.target(), "https://example.com/users");
    }

    #[test]
    fn target_ignores_base_for_absolute_url() {
        let config = RequestConfig::new("http://other.org/a").with_base_url("https://example.com");
        assert_eq!(config.target(), "http://other.org/a");
    }

    #[test]
    fn target_without_url_is_base() {
        let config = RequestConfig::default().with_base_url("https://example.com");
        assert_eq!(config.target(), "https://example.com");
    }

    #[test]
    fn is_get_ignores_case_and_defaults_to_true() {
        assert!(RequestConfig::new("/").is_get());
        assert!(RequestConfig::get("/").is_get());
        let lower = Method::from_bytes(b"get").unwrap();
        assert!(RequestConfig::new("/").with_method(lower).is_get());
        assert!(!RequestConfig::post("/").is_get());
    }

    #[test]
    fn merge_prefers_overlay_fields() {
        let base = RequestConfig::get("/users")
            .with_base_url("https://example.com")
            .with_header("accept", "application/json")
            .with_header("x-trace", "base");
        let overlay = RequestConfig::default()
            .with_params(json!({ "page": 3 }))
            .with_header("x-trace", "call");

        let merged = base.merge(&overlay);
        assert_eq!(merged.url.as_deref(), Some("/users"));
        assert_eq!(merged.method, Some(Method::GET));
        assert_eq!(merged.params, Some(json!({ "page": 3 })));
        assert_eq!(merged.headers["accept"], json!("application/json"));
        assert_eq!(merged.headers["x-trace"], json!("call"));
    }
}
