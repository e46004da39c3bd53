//! [`Transport`] implementation backed by [`reqwest::Client`].

use async_trait::async_trait;
use fetchbox_core::{CancelToken, RawResponse, RequestConfig, Transport, TransportFailure};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, trace};

/// Sends fetchbox requests with reqwest.
///
/// - `base_url` and `url` are joined by [`RequestConfig::target`]
/// - `params` must be a JSON object; arrays become repeated keys and `null`
///   values are skipped
/// - `data` is sent as a JSON body
/// - bodies are decoded as JSON, falling back to a string; an empty body is
///   `null`
/// - unsuccessful statuses fail with [`TransportFailure::status`]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
    default_headers: HeaderMap,
}

impl ReqwestTransport {
    /// Creates a transport over `client`.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            default_headers: HeaderMap::new(),
        }
    }

    /// Creates a builder.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn prepare(&self, config: &RequestConfig) -> Result<reqwest::Request, TransportFailure> {
        let url = build_url(config)?;
        let method = config.method.clone().unwrap_or(Method::GET);

        let mut headers = self.default_headers.clone();
        for (name, value) in &config.headers {
            let Some(value) = scalar_text(value) else {
                continue;
            };
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportFailure::other(format!("invalid header `{name}`: {err}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|err| TransportFailure::other(format!("invalid header `{name}`: {err}")))?;
            headers.insert(name, value);
        }

        let mut builder = self.client.request(method, url);
        if let Some(data) = &config.data {
            let body = serde_json::to_vec(data)
                .map_err(|err| TransportFailure::other(format!("unserializable body: {err}")))?;
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            builder = builder.body(body);
        }

        builder
            .headers(headers)
            .build()
            .map_err(|err| TransportFailure::other(err.to_string()))
    }

    async fn execute(&self, request: reqwest::Request) -> Result<RawResponse, TransportFailure> {
        let response = self.client.execute(request).await.map_err(network_failure)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(network_failure)?;
        let data = decode_body(&body);

        trace!(status = status.as_u16(), bytes = body.len(), "response received");
        if status.is_success() {
            Ok(RawResponse {
                status,
                headers,
                data,
            })
        } else {
            Err(TransportFailure::status(status, Some(data).filter(|d| !d.is_null())))
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn invoke(
        &self,
        config: RequestConfig,
        token: CancelToken,
    ) -> Result<RawResponse, TransportFailure> {
        let request = self.prepare(&config)?;
        debug!(method = %request.method(), url = %request.url(), "sending request");

        // Dropping the in-flight future aborts the connection.
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(token.to_failure()),
            result = self.execute(request) => result,
        }
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug, Default)]
pub struct ReqwestTransportBuilder {
    client: Option<Client>,
    default_headers: HeaderMap,
}

impl ReqwestTransportBuilder {
    /// Uses `client` instead of a default one.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Adds a header sent with every request. Per-request headers win.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Builds the transport.
    pub fn build(self) -> ReqwestTransport {
        ReqwestTransport {
            client: self.client.unwrap_or_default(),
            default_headers: self.default_headers,
        }
    }
}

fn build_url(config: &RequestConfig) -> Result<Url, TransportFailure> {
    let target = config.target();
    let mut url = Url::parse(&target)
        .map_err(|err| TransportFailure::other(format!("invalid url `{target}`: {err}")))?;

    match &config.params {
        None | Some(Value::Null) => {}
        Some(Value::Object(params)) => {
            let mut pairs = Vec::new();
            for (name, value) in params {
                match value {
                    Value::Array(items) => {
                        pairs.extend(items.iter().filter_map(scalar_text).map(|v| (name, v)));
                    }
                    other => pairs.extend(scalar_text(other).map(|v| (name, v))),
                }
            }
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }
        Some(other) => {
            return Err(TransportFailure::other(format!(
                "params must be an object, got `{other}`"
            )));
        }
    }
    Ok(url)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn decode_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn network_failure(err: reqwest::Error) -> TransportFailure {
    let failure = TransportFailure::network(err.to_string());
    let failure = match err.status() {
        Some(status) => failure.with_response(status, None),
        None => failure,
    };
    if err.is_timeout() {
        failure.with_code("ECONNABORTED")
    } else if err.is_connect() {
        failure.with_code("ECONNREFUSED")
    } else {
        failure
    }
}
