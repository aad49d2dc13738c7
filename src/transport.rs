use std::future::Future;

use serde_json::Value as JsonValue;
use url::Url;

use crate::error::Error;

/// HTTP methods used by the brokerage API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Fully built outgoing request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<JsonValue>,
}

impl ApiRequest {
    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response as seen by the gateway.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }

    /// Parses the body as JSON, or returns `None` if it is not declared JSON or is empty.
    pub(crate) fn json(&self) -> Result<Option<JsonValue>, Error> {
        if !self.is_json() || self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&self.body).map(Some).map_err(Into::into)
    }
}

/// Network seam under the request gateway.
///
/// Implementations must carry cookies across calls: the refresh credential
/// lives only in the cookie jar and has to reach the renewal endpoint.
///
/// # Example
///
/// ```rust,ignore
/// impl Transport for MyTransport {
///     async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
///         self.inner.execute(request).await
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ApiRequest)
    -> impl Future<Output = Result<ApiResponse, Error>> + Send;
}

/// `reqwest`-backed transport with a cookie jar enabled.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Build a transport with its own cookie store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self { http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// The client should have a cookie store, or token renewal will never succeed.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?.to_vec();

        Ok(ApiResponse {
            status,
            content_type,
            body,
        })
    }
}
