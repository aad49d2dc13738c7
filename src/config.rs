use url::Url;

use crate::error::Error;

const DEFAULT_API_BASE: &str = "http://localhost:8080";
const DEFAULT_LOCALE: &str = "en-US";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Client configuration for the brokerage API.
///
/// The API base is a constructor parameter; locale and timezone have defaults
/// and can be overridden by chaining.
///
/// ```rust,ignore
/// use prudent_session::ClientConfig;
///
/// let config = ClientConfig::new("https://api.example.com".parse()?)
///     .with_locale("fr-CA")
///     .with_timezone("America/Toronto");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) api_base: Url,
    pub(crate) locale: String,
    pub(crate) timezone: String,
}

impl ClientConfig {
    #[must_use]
    pub fn new(api_base: Url) -> Self {
        Self {
            api_base,
            locale: DEFAULT_LOCALE.into(),
            timezone: DEFAULT_TIMEZONE.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `API_BASE`: API origin (default `http://localhost:8080`)
    /// - `CLIENT_LOCALE`: sent as `Accept-Language` (default `en-US`)
    /// - `CLIENT_TIMEZONE`: sent as `X-Timezone`, falls back to `TZ`, then `UTC`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `API_BASE` is not a valid URL.
    pub fn from_env() -> Result<Self, Error> {
        let base = std::env::var("API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into());
        let api_base: Url = base
            .parse()
            .map_err(|e| Error::Config(format!("API_BASE: {e}")))?;

        let mut config = Self::new(api_base);

        if let Some(locale) = non_empty_var("CLIENT_LOCALE") {
            config = config.with_locale(locale);
        }
        if let Some(tz) = non_empty_var("CLIENT_TIMEZONE").or_else(|| non_empty_var("TZ")) {
            config = config.with_timezone(tz);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Base that request paths are appended to.
    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Sent as `Accept-Language`.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Sent as `X-Timezone`.
    #[must_use]
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Client hint headers attached to every outgoing request.
    #[must_use]
    pub fn hints(&self) -> ClientHints {
        ClientHints {
            accept_language: self.locale.clone(),
            timezone: self.timezone.clone(),
        }
    }

    /// Resolve an API path against the base.
    ///
    /// The path is appended verbatim, so a base with a path prefix
    /// (`https://host/api`) keeps it. `Url::join` would drop it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the combined string is not a valid URL.
    pub fn url_for(&self, path: &str) -> Result<Url, Error> {
        let base = self.api_base.as_str().trim_end_matches('/');
        format!("{base}{path}")
            .parse()
            .map_err(|e| Error::Config(format!("invalid request URL for {path}: {e}")))
    }
}

/// `Accept-Language` and `X-Timezone` hints for server-side i18n.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHints {
    pub accept_language: String,
    pub timezone: String,
}

impl ClientHints {
    pub(crate) fn headers(&self) -> [(&'static str, String); 2] {
        [
            ("Accept-Language", self.accept_language.clone()),
            ("X-Timezone", self.timezone.clone()),
        ]
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
