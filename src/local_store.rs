use std::collections::HashMap;

use parking_lot::Mutex;

use crate::profile::UserProfile;

/// Key under which the profile mirror is kept.
pub const PROFILE_KEY: &str = "auth:user";

const PUSH_MARK_PREFIX: &str = "push:token:registered:";

/// Client-local key/value storage (browser `localStorage`, a file, a keychain).
///
/// Only caches live here. The access token never does.
pub trait LocalStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// Process-local [`LocalStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.lock().insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

/// Per-user mark recording that a push token was registered for this account.
///
/// Keyed by email, then id, then `anon`.
#[must_use]
pub fn push_mark_key(profile: Option<&UserProfile>) -> String {
    let who = profile
        .map(|p| p.email.clone())
        .filter(|e| !e.is_empty())
        .or_else(|| profile.and_then(|p| p.id.as_ref()).map(ToString::to_string))
        .unwrap_or_else(|| "anon".into());
    format!("{PUSH_MARK_PREFIX}{who}")
}
