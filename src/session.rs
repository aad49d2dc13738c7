use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::credential::{AccessToken, CredentialStore};
use crate::endpoints;
use crate::error::Error;
use crate::gateway::Gateway;
use crate::local_store::{LocalStore, MemoryStore, PROFILE_KEY, push_mark_key};
use crate::profile::{AuthPayload, UserProfile};
use crate::registration::{RegistrationMode, RegistrationStep};
use crate::transport::{Method, Transport};

/// Observable session value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    /// Set when the last auth response asked for registration completion.
    pub requires_registration: bool,
}

/// One running application's session: credential, current user, gateway.
///
/// Construct with [`Session::create`], hand it (by reference or `Arc`) to
/// whatever composes the application, and end it with [`Session::dispose`].
/// Each instance owns its own credential store.
///
/// ```rust,ignore
/// let session = Session::create(ClientConfig::from_env()?, HttpTransport::new()?)?;
/// session.bootstrap().await;
///
/// let mut changes = session.subscribe();
/// while changes.changed().await.is_ok() {
///     render(&changes.borrow().user);
/// }
/// ```
pub struct Session<T> {
    gateway: Gateway<T>,
    state: watch::Sender<SessionState>,
    local: Arc<dyn LocalStore>,
}

impl<T: Transport> Session<T> {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API URLs cannot be built from `config`.
    pub fn create(config: ClientConfig, transport: T) -> Result<Self, Error> {
        let gateway = Gateway::with_store(config, transport, CredentialStore::new())?;
        let (state, _) = watch::channel(SessionState::default());
        Ok(Self {
            gateway,
            state,
            local: Arc::new(MemoryStore::new()),
        })
    }

    /// Use a custom local store for the profile mirror and per-user marks.
    #[must_use]
    pub fn with_local_store(mut self, store: impl LocalStore) -> Self {
        self.local = Arc::new(store);
        self
    }

    /// End the session: drop the in-memory credential and notify subscribers.
    ///
    /// Server-side state and the local mirror are left alone; use
    /// [`sign_out`](Self::sign_out) to end the account session.
    pub fn dispose(self) {
        self.gateway.credentials().revoke();
        self.state.send_replace(SessionState::default());
        tracing::debug!("Session disposed");
    }

    /// Underlying gateway. Its calls do not end the session on a `401`.
    #[must_use]
    pub fn gateway(&self) -> &Gateway<T> {
        &self.gateway
    }

    /// Credential store shared with the gateway and refresh coordinator.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        self.gateway.credentials()
    }

    /// Current user, if signed in.
    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user.clone()
    }

    /// Snapshot of the observable state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every change to the session state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Registration mode derived from the current user, flag and credential.
    #[must_use]
    pub fn mode(&self) -> RegistrationMode {
        let state = self.state.borrow();
        RegistrationMode::derive(
            state.user.as_ref(),
            state.requires_registration,
            self.credentials().is_present(),
        )
    }

    /// Current mode with its entry action applied (pre-filled completion form when pending).
    #[must_use]
    pub fn registration(&self) -> RegistrationStep {
        let mode = self.mode();
        RegistrationStep::enter(mode, self.state.borrow().user.as_ref())
    }

    /// Last mirrored profile, for first paint only. Never authoritative.
    #[must_use]
    pub fn cached_user(&self) -> Option<UserProfile> {
        let raw = self.local.get(PROFILE_KEY)?;
        serde_json::from_str::<JsonValue>(&raw)
            .ok()
            .and_then(|v| UserProfile::from_value(v).ok())
    }

    /// Restore the session at startup: silent renewal, then `/me`.
    ///
    /// Never fails; any problem leaves the session anonymous.
    pub async fn bootstrap(&self) {
        if !self.gateway.refresher().renew().await {
            tracing::info!("No renewable session; starting anonymous");
            self.set_anonymous();
            return;
        }

        let identity = self
            .gateway
            .call(Method::Get, endpoints::ME, None)
            .await
            .and_then(UserProfile::from_value);

        match identity {
            Ok(profile) => {
                tracing::info!(status = ?profile.status, "Session restored");
                self.store_user(Some(profile), false);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity fetch failed during bootstrap");
                self.credentials().clear();
                self.set_anonymous();
            }
        }
    }

    /// Make sure an access token is held, renewing through the refresh cookie if not.
    ///
    /// Returns `false` when no token could be obtained.
    pub async fn ensure_access_token(&self) -> bool {
        if self.credentials().is_present() {
            return true;
        }
        self.gateway.refresher().renew().await
    }

    /// Adopt the result of a successful authentication or registration.
    ///
    /// `raw` may be a bare profile or an envelope; a token in `credential`
    /// takes precedence over one embedded in `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if `raw` carries no valid profile. Nothing
    /// is changed in that case.
    pub fn adopt_after_auth(
        &self,
        raw: JsonValue,
        credential: Option<AccessToken>,
    ) -> Result<UserProfile, Error> {
        let mut payload = AuthPayload::from_value(raw)?;
        if credential.is_some() {
            payload.access_token = credential;
        }
        self.adopt(payload)
    }

    pub(crate) fn adopt(&self, payload: AuthPayload) -> Result<UserProfile, Error> {
        let profile = payload
            .profile
            .ok_or_else(|| Error::Profile("response carried no profile".into()))?;
        if let Some(token) = payload.access_token {
            self.credentials().set(Some(token));
        }
        self.store_user(Some(profile.clone()), payload.requires_registration);
        Ok(profile)
    }

    /// Replace the current profile after an edit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if `raw` is not a valid profile.
    pub fn update_profile(&self, raw: JsonValue) -> Result<UserProfile, Error> {
        let profile = UserProfile::from_value(raw)?;
        let requires_registration = self.state.borrow().requires_registration;
        self.store_user(Some(profile.clone()), requires_registration);
        Ok(profile)
    }

    /// Re-fetch `/me` and adopt it as the authoritative profile.
    ///
    /// # Errors
    ///
    /// Propagates the gateway error. A `401` also tears the session down.
    pub async fn reconcile(&self) -> Result<UserProfile, Error> {
        let raw = self.call(Method::Get, endpoints::ME, None).await?;
        let profile = UserProfile::from_value(raw)?;
        self.store_user(Some(profile.clone()), false);
        Ok(profile)
    }

    /// Gateway call that tears the session down on an unrecoverable `401`.
    ///
    /// # Errors
    ///
    /// As [`Gateway::call`].
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<JsonValue, Error> {
        let result = self.gateway.call(method, path, body).await;
        self.guard(result)
    }

    /// Revoke server-side, then clear everything local. Always ends anonymous.
    pub async fn sign_out(&self) {
        // Revoke first: it still needs the bearer token.
        if let Err(e) = self.gateway.call(Method::Post, endpoints::LOGOUT, None).await {
            tracing::warn!(error = %e, "Server-side logout failed; clearing local session anyway");
        }

        // Also discards a renewal still in flight.
        self.credentials().revoke();
        let marked = self.user().or_else(|| self.cached_user());
        self.local.remove(&push_mark_key(marked.as_ref()));
        self.local.remove(PROFILE_KEY);
        self.state.send_replace(SessionState::default());

        tracing::info!("Signed out");
    }

    pub(crate) fn guard<R>(&self, result: Result<R, Error>) -> Result<R, Error> {
        if let Err(e) = &result {
            if e.is_unauthorized() && self.state.borrow().user.is_some() {
                tracing::info!("Authorization lost; ending session");
                self.set_anonymous();
            }
        }
        result
    }

    pub(crate) fn store_user(&self, user: Option<UserProfile>, requires_registration: bool) {
        match &user {
            Some(profile) => match serde_json::to_string(profile) {
                Ok(json) => self.local.set(PROFILE_KEY, json),
                Err(e) => tracing::warn!(error = %e, "Could not mirror profile"),
            },
            None => self.local.remove(PROFILE_KEY),
        }
        self.state.send_replace(SessionState {
            user,
            requires_registration,
        });
    }

    fn set_anonymous(&self) {
        self.store_user(None, false);
    }
}
