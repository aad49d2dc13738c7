use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::config::ClientConfig;
use crate::credential::CredentialStore;
use crate::endpoints;
use crate::error::Error;
use crate::refresh::RefreshCoordinator;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

/// Authenticated request gateway.
///
/// Every call carries the client hints and, when one is held, the bearer token.
/// A `401` triggers one token renewal and one retry; a `401` that survives that
/// clears the credential store.
pub struct Gateway<T> {
    transport: Arc<T>,
    config: ClientConfig,
    store: CredentialStore,
    refresher: RefreshCoordinator<T>,
}

impl<T: Transport> Gateway<T> {
    /// Create a gateway with its own empty credential store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the renewal URL cannot be built.
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, Error> {
        Self::with_store(config, transport, CredentialStore::new())
    }

    /// Create a gateway over an existing credential store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the renewal URL cannot be built.
    pub fn with_store(
        config: ClientConfig,
        transport: T,
        store: CredentialStore,
    ) -> Result<Self, Error> {
        let transport = Arc::new(transport);
        let refresher = RefreshCoordinator::new(transport.clone(), &config, store.clone())?;
        Ok(Self {
            transport,
            config,
            store,
            refresher,
        })
    }

    /// Credential store read on every call and cleared on a terminal `401`.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    /// Coordinator used for the one renewal per rejected call.
    #[must_use]
    pub fn refresher(&self) -> &RefreshCoordinator<T> {
        &self.refresher
    }

    /// Base URL and locale hints this gateway was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issue a request and return its JSON body.
    ///
    /// Returns [`JsonValue::Null`] when the response is not declared JSON
    /// (for example a `204`), so callers must not assume a body.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] for a non-2xx final response, with the server's
    ///   `error`/`message` detail when present
    /// - a transport error if the network call itself fails
    /// - [`Error::Decode`] if a JSON-declared body does not parse
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<JsonValue, Error> {
        let request = self.build(method, path, body.clone())?;
        let mut response = self.transport.send(request).await?;

        if response.status == 401 && endpoints::route_of(path) != endpoints::REFRESH {
            tracing::debug!(method = method.as_str(), path, "Unauthorized; renewing access token");
            if self.refresher.renew().await {
                // Rebuilt so the retry picks up the renewed token.
                let retry = self.build(method, path, body)?;
                response = self.transport.send(retry).await?;
                tracing::debug!(status = response.status, path, "Retried after renewal");
            }
        }

        if !response.is_success() {
            if response.status == 401 {
                self.store.clear();
            }
            return Err(error_from_response(&response));
        }

        Ok(response.json()?.unwrap_or(JsonValue::Null))
    }

    /// `GET` and deserialize the body.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call), plus [`Error::Decode`] if the body does not match `R`.
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, Error> {
        let value = self.call(Method::Get, path, None).await?;
        serde_json::from_value(value).map_err(Into::into)
    }

    /// `POST` a JSON body and deserialize the response.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call), plus [`Error::Decode`] if the body does not match `R`.
    pub async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, Error> {
        let body = serde_json::to_value(body)?;
        let value = self.call(Method::Post, path, Some(body)).await?;
        serde_json::from_value(value).map_err(Into::into)
    }

    fn build(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<ApiRequest, Error> {
        let mut headers: Vec<(String, String)> = self
            .config
            .hints()
            .headers()
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect();
        if body.is_some() {
            headers.push(("Content-Type".into(), "application/json".into()));
        }
        if let Some(token) = self.store.get() {
            headers.push(("Authorization".into(), token.bearer()));
        }

        Ok(ApiRequest {
            method,
            url: self.config.url_for(path)?,
            headers,
            body,
        })
    }
}

/// Best-effort `error`/`message` extraction, whatever the declared content type.
fn error_from_response(response: &ApiResponse) -> Error {
    let detail = serde_json::from_slice::<JsonValue>(&response.body)
        .ok()
        .and_then(|body| {
            ["error", "message"].into_iter().find_map(|key| {
                body.get(key)
                    .and_then(JsonValue::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
            })
        });
    Error::api(response.status, detail.as_deref())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{ScriptedTransport, test_config};

    fn gateway(transport: &ScriptedTransport) -> Gateway<ScriptedTransport> {
        Gateway::new(test_config(), transport.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_bearer_header_when_token_present() {
        let transport = ScriptedTransport::new();
        transport.reply(Method::Get, "/me", 200, json!({"email": "a@b.com"}));
        let gw = gateway(&transport);
        gw.credentials().set(Some("tok".into()));

        gw.call(Method::Get, "/me", None).await.unwrap();

        let sent = transport.sent_to("/me");
        assert_eq!(sent[0].header("Authorization"), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn test_no_bearer_header_when_absent() {
        let transport = ScriptedTransport::new();
        transport.reply(Method::Get, "/quotes", 200, json!([]));
        let gw = gateway(&transport);

        gw.call(Method::Get, "/quotes", None).await.unwrap();

        let sent = transport.sent_to("/quotes");
        assert_eq!(sent[0].header("Authorization"), None);
    }

    #[tokio::test]
    async fn test_content_type_only_with_body() {
        let transport = ScriptedTransport::new();
        transport.reply(Method::Get, "/a", 200, json!({}));
        transport.reply(Method::Post, "/b", 200, json!({}));
        let gw = gateway(&transport);

        gw.call(Method::Get, "/a", None).await.unwrap();
        gw.call(Method::Post, "/b", Some(json!({"x": 1}))).await.unwrap();

        assert_eq!(transport.sent_to("/a")[0].header("Content-Type"), None);
        let b = &transport.sent_to("/b")[0];
        assert_eq!(b.header("Content-Type"), Some("application/json"));
        assert_eq!(b.body, Some(json!({"x": 1})));
        assert_eq!(b.header("Accept-Language"), Some("en-GB"));
        assert_eq!(b.header("X-Timezone"), Some("Europe/London"));
    }

    #[tokio::test]
    async fn test_retry_once_after_renewal() {
        let transport = ScriptedTransport::new();
        transport.reply(Method::Get, "/me", 401, json!({"error": "expired"}));
        transport.reply(Method::Post, endpoints::REFRESH, 200, json!({"accessToken": "fresh"}));
        transport.reply(Method::Get, "/me", 200, json!({"email": "a@b.com"}));
        let gw = gateway(&transport);
        gw.credentials().set(Some("old".into()));

        let body = gw.call(Method::Get, "/me", None).await.unwrap();

        assert_eq!(body, json!({"email": "a@b.com"}));
        assert_eq!(transport.refresh_count(), 1);
        let me = transport.sent_to("/me");
        assert_eq!(me.len(), 2);
        assert_eq!(me[0].header("Authorization"), Some("Bearer old"));
        assert_eq!(me[1].header("Authorization"), Some("Bearer fresh"));
    }

    #[tokio::test]
    async fn test_no_second_renewal_when_retry_fails() {
        let transport = ScriptedTransport::new();
        transport.reply(Method::Get, "/me", 401, json!({}));
        transport.reply(Method::Post, endpoints::REFRESH, 200, json!({"accessToken": "fresh"}));
        transport.reply(Method::Get, "/me", 401, json!({"message": "revoked"}));
        let gw = gateway(&transport);

        let err = gw.call(Method::Get, "/me", None).await.unwrap_err();

        assert_eq!(err.to_string(), "HTTP 401 — revoked");
        assert_eq!(transport.refresh_count(), 1);
        assert_eq!(transport.count("/me"), 2);
        assert_eq!(gw.credentials().get(), None);
    }

    #[tokio::test]
    async fn test_failed_renewal_surfaces_first_response_error() {
        let transport = ScriptedTransport::new();
        transport.reply(Method::Get, "/me", 401, json!({"error": "expired"}));
        transport.reply(Method::Post, endpoints::REFRESH, 401, json!({}));
        let gw = gateway(&transport);
        gw.credentials().set(Some("old".into()));

        let err = gw.call(Method::Get, "/me", None).await.unwrap_err();

        assert_eq!(err.to_string(), "HTTP 401 — expired");
        assert_eq!(transport.count("/me"), 1);
        assert!(!gw.credentials().is_present());
    }

    #[tokio::test]
    async fn test_refresh_path_is_never_retried() {
        let transport = ScriptedTransport::new();
        transport.reply(Method::Post, endpoints::REFRESH, 401, json!({}));
        let gw = gateway(&transport);

        let err = gw.call(Method::Post, endpoints::REFRESH, None).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(transport.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_skip_renewal() {
        let transport = ScriptedTransport::new();
        transport.reply(Method::Post, "/quotes", 422, json!({"error": "zip code required"}));
        transport.reply(Method::Get, "/quotes", 500, json!({}));
        let gw = gateway(&transport);
        gw.credentials().set(Some("tok".into()));

        let err = gw.call(Method::Post, "/quotes", Some(json!({}))).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 422 — zip code required");

        let err = gw.call(Method::Get, "/quotes", None).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500");

        assert_eq!(transport.refresh_count(), 0);
        assert!(gw.credentials().is_present());
    }

    #[tokio::test]
    async fn test_error_prefers_error_over_message() {
        let transport = ScriptedTransport::new();
        transport.reply(Method::Get, "/x", 400, json!({"error": "first", "message": "second"}));
        let gw = gateway(&transport);

        let err = gw.call(Method::Get, "/x", None).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 400 — first");
    }

    #[tokio::test]
    async fn test_non_json_success_is_null() {
        let transport = ScriptedTransport::new();
        transport.reply_empty(Method::Post, "/public/auth/logout", 204);
        let gw = gateway(&transport);

        let body = gw.call(Method::Post, "/public/auth/logout", None).await.unwrap();
        assert_eq!(body, JsonValue::Null);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = ScriptedTransport::new();
        transport.fail(Method::Get, "/me", "network unreachable");
        let gw = gateway(&transport);

        let err = gw.call(Method::Get, "/me", None).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(transport.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_renewal() {
        let transport =
            ScriptedTransport::new().with_latency(std::time::Duration::from_millis(10));
        transport.reply(Method::Get, "/a", 401, json!({}));
        transport.reply(Method::Get, "/b", 401, json!({}));
        transport.reply(Method::Post, endpoints::REFRESH, 200, json!({"accessToken": "new"}));
        transport.reply(Method::Get, "/a", 200, json!({"a": true}));
        transport.reply(Method::Get, "/b", 200, json!({"b": true}));
        let gw = gateway(&transport);

        let (a, b) = tokio::join!(
            gw.call(Method::Get, "/a", None),
            gw.call(Method::Get, "/b", None)
        );

        assert_eq!(a.unwrap(), json!({"a": true}));
        assert_eq!(b.unwrap(), json!({"b": true}));
        assert_eq!(transport.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_typed_get() {
        #[derive(serde::Deserialize)]
        struct Quote {
            id: u32,
        }

        let transport = ScriptedTransport::new();
        transport.reply(Method::Get, "/quotes/7", 200, json!({"id": 7}));
        let gw = gateway(&transport);

        let quote: Quote = gw.get("/quotes/7").await.unwrap();
        assert_eq!(quote.id, 7);
    }
}
