use std::sync::Arc;

use derive_more::{From, Into};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Short-lived bearer token. Opaque: never parsed, never persisted.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// Keep tokens out of logs.
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// In-memory holder of the current access credential.
///
/// Clones share the same cell, so a renewal written through one handle is
/// seen by every other handle on its next read.
///
/// Each [`revoke`](Self::revoke) starts a new generation. A renewal that
/// began in an earlier generation cannot write its token back.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    token: Option<AccessToken>,
    generation: u64,
}

impl CredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<AccessToken> {
        self.inner.read().token.clone()
    }

    pub fn set(&self, token: Option<AccessToken>) {
        self.inner.write().token = token;
    }

    pub fn clear(&self) {
        self.set(None);
    }

    /// Clear the token and invalidate any renewal still in flight.
    pub fn revoke(&self) {
        let mut slot = self.inner.write();
        slot.token = None;
        slot.generation += 1;
    }

    /// Current generation, to pass to [`set_if_generation`](Self::set_if_generation).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Store `token` only if no [`revoke`](Self::revoke) happened since `generation` was read.
    ///
    /// Returns whether the token was stored.
    pub fn set_if_generation(&self, token: AccessToken, generation: u64) -> bool {
        let mut slot = self.inner.write();
        if slot.generation != generation {
            return false;
        }
        slot.token = Some(token);
        true
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.inner.read().token.is_some()
    }
}
