#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Non-2xx response. `message` is already formatted for display.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid response body: {0}")]
    Decode(String),
    #[error("Invalid profile: {0}")]
    Profile(String),
    #[error("{0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Identity token error: {0}")]
    Token(String),
}

impl Error {
    /// Builds an [`Error::Api`] from a status code and an optional server detail.
    ///
    /// The message reads `HTTP <status>`, or `HTTP <status> — <detail>` when the
    /// server supplied one.
    #[must_use]
    pub fn api(status: u16, detail: Option<&str>) -> Self {
        let message = match detail {
            Some(detail) if !detail.is_empty() => format!("HTTP {status} — {detail}"),
            _ => format!("HTTP {status}"),
        };
        Self::Api { status, message }
    }

    /// HTTP status carried by the error, if it came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
