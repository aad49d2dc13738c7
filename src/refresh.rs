use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value as JsonValue;
use url::Url;

use crate::config::{ClientConfig, ClientHints};
use crate::credential::CredentialStore;
use crate::endpoints;
use crate::error::Error;
use crate::transport::{ApiRequest, Method, Transport};

/// Outcome of the most recently finished renewal.
#[derive(Debug, Default)]
struct LastRenewal {
    epoch: u64,
    renewed: bool,
}

/// Mints access tokens from the cookie-held refresh credential.
///
/// Concurrent [`renew`](Self::renew) calls are coalesced: while one renewal is
/// in flight, later callers wait for it and share its result rather than
/// hitting the endpoint again.
pub struct RefreshCoordinator<T> {
    transport: Arc<T>,
    url: Url,
    hints: ClientHints,
    store: CredentialStore,
    gate: tokio::sync::Mutex<LastRenewal>,
    // Mirrors `LastRenewal::epoch`, readable without taking the gate.
    epoch: AtomicU64,
}

impl<T: Transport> RefreshCoordinator<T> {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the renewal URL cannot be built from the config.
    pub fn new(
        transport: Arc<T>,
        config: &ClientConfig,
        store: CredentialStore,
    ) -> Result<Self, Error> {
        Ok(Self {
            transport,
            url: config.url_for(endpoints::REFRESH)?,
            hints: config.hints(),
            store,
            gate: tokio::sync::Mutex::new(LastRenewal::default()),
            epoch: AtomicU64::new(0),
        })
    }

    /// Try to obtain a fresh access token. Never fails: `false` means "stay unauthenticated".
    pub async fn renew(&self) -> bool {
        let observed = self.epoch.load(Ordering::Acquire);
        let mut last = self.gate.lock().await;

        if last.epoch != observed {
            tracing::debug!(renewed = last.renewed, "Joined in-flight token renewal");
            return last.renewed;
        }

        let renewed = self.probe().await;
        last.epoch += 1;
        last.renewed = renewed;
        self.epoch.store(last.epoch, Ordering::Release);
        renewed
    }

    async fn probe(&self) -> bool {
        // Authorised by the refresh cookie alone; no bearer header.
        let request = ApiRequest {
            method: Method::Post,
            url: self.url.clone(),
            headers: self
                .hints
                .headers()
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
            body: None,
        };

        let generation = self.store.generation();
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Token renewal request failed");
                return false;
            }
        };

        if !response.is_success() {
            tracing::debug!(status = response.status, "Token renewal rejected");
            return false;
        }

        let token = match response.json() {
            Ok(Some(body)) => body
                .get("accessToken")
                .and_then(JsonValue::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Token renewal returned an unreadable body");
                return false;
            }
        };

        match token {
            Some(token) => {
                if !self.store.set_if_generation(token.into(), generation) {
                    tracing::debug!("Session revoked during renewal; discarding token");
                    return false;
                }
                tracing::debug!("Access token renewed");
                true
            }
            None => {
                tracing::warn!("Token renewal response carried no access token");
                false
            }
        }
    }
}
