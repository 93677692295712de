//! The network seam: a request goes in, a status and body come out.
//!
//! Transports never interpret status codes. Deciding what a 401 or a 500
//! means is the retry policy's job.

use std::future::Future;
use std::pin::Pin;

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::Error;

/// A request relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<JsonValue>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Path plus percent-encoded query string.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.path)
    }

    /// The bearer token carried by this request, if any.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// A response of any status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A JSON response, mostly useful for fakes.
    #[must_use]
    pub fn json(status: StatusCode, body: &JsonValue) -> Self {
        Self::new(status, body.to_string())
    }

    /// Decode the body. An empty body decodes as JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_slice(b"null").map_err(Into::into);
        }
        serde_json::from_slice(&self.body).map_err(Into::into)
    }

    /// Body as JSON, or `None` when it is not JSON.
    #[must_use]
    pub fn json_body(&self) -> Option<JsonValue> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Performs the network call.
///
/// Implementations apply their own per-call timeout and report it as
/// [`Error::Timeout`]; anything else that prevents a response is
/// [`Error::Network`].
///
/// # Example
///
/// ```rust,ignore
/// impl Transport for RecordedTransport {
///     async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
///         self.replay(&request.path).ok_or(Error::Network("no recording".into()))
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send {
        (**self).send(request)
    }
}

pub(crate) type SendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ApiResponse, Error>> + Send + 'a>>;

/// Object-safe wrapper for Transport (needed for Arc<dyn>).
pub(crate) trait TransportDyn: Send + Sync {
    fn send_dyn(&self, request: ApiRequest) -> SendFuture<'_>;
}

impl<T: Transport> TransportDyn for T {
    fn send_dyn(&self, request: ApiRequest) -> SendFuture<'_> {
        Box::pin(self.send(request))
    }
}

#[cfg(feature = "http-transport")]
pub use self::http_transport::HttpTransport;

#[cfg(feature = "http-transport")]
mod http_transport {
    use url::Url;

    use super::{ApiRequest, ApiResponse, Transport};
    use crate::config::ClientConfig;
    use crate::error::Error;

    /// reqwest-backed transport rooted at the configured API base URL.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        base_url: Url,
        http: reqwest::Client,
    }

    impl HttpTransport {
        /// Build a transport with the configured timeout and user agent.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Config`] if the HTTP client cannot be built.
        pub fn new(config: &ClientConfig) -> Result<Self, Error> {
            let http = reqwest::Client::builder()
                .timeout(config.timeout())
                .user_agent(config.user_agent())
                .build()
                .map_err(|e| Error::Config(format!("http client: {e}")))?;
            Ok(Self {
                base_url: config.base_url().clone(),
                http,
            })
        }

        /// Use a custom HTTP client (for connection pool reuse or testing).
        /// The client's own timeout applies.
        #[must_use]
        pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
            self.http = client;
            self
        }

        pub(crate) fn url_for(&self, request: &ApiRequest) -> Result<Url, Error> {
            let base = self.base_url.as_str().trim_end_matches('/');
            let path = request.path_and_query();
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
                .parse()
                .map_err(|e| Error::Config(format!("request url: {e}")))
        }
    }

    impl Transport for HttpTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
            let url = self.url_for(&request)?;
            let mut builder = self
                .http
                .request(request.method, url)
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body.to_string());
            }

            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok(ApiResponse::new(status, body.to_vec()))
        }
    }

}
