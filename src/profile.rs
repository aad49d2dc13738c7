use std::collections::BTreeSet;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use crate::credential::AccessToken;
use crate::error::Error;

/// Account status, parsed case-insensitively at the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    Active,
    Pending,
    Disabled,
}

impl UserStatus {
    /// Parse a wire value; unknown strings yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "PENDING" => Some(Self::Pending),
            "DISABLED" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Backend user identifier. The wire carries either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match JsonValue::deserialize(deserializer)? {
            JsonValue::String(s) => Ok(Self(s)),
            JsonValue::Number(n) => Ok(Self(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "user id must be a string or number, got {other}"
            ))),
        }
    }
}

/// Canonical user profile held by the session.
///
/// `email` is always present; every other field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<UserStatus>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<String>,
    #[serde(default, with = "lenient_rfc3339", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "lenient_rfc3339", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default, with = "lenient_rfc3339", skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<OffsetDateTime>,
}

impl UserProfile {
    /// Create a profile with only the required `email` field.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: None,
            email: email.into(),
            picture: None,
            phone_number: None,
            status: None,
            roles: BTreeSet::new(),
            created_at: None,
            updated_at: None,
            last_login_at: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(UserId(id.into()));
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == Some(UserStatus::Pending)
    }

    /// Parse a profile from any wire shape (bare or `{ profile }` envelope).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the value is not an object or lacks a non-blank `email`.
    pub fn from_value(raw: JsonValue) -> Result<Self, Error> {
        let profile: Self =
            serde_json::from_value(normalize(raw)).map_err(|e| Error::Profile(e.to_string()))?;
        if profile.email.trim().is_empty() {
            return Err(Error::Profile("email must not be empty".into()));
        }
        Ok(profile)
    }
}

/// Unwrap the `{ profile: {...} }` envelope into a bare profile.
///
/// This is the only place the envelope is recognised. Idempotent: a bare
/// profile passes through unchanged.
#[must_use]
pub fn normalize(raw: JsonValue) -> JsonValue {
    if let Some(profile @ JsonValue::Object(_)) = raw.get("profile") {
        return profile.clone();
    }
    raw
}

/// Parsed response of any sign-in, sign-up or verification endpoint.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct AuthPayload {
    pub access_token: Option<AccessToken>,
    pub profile: Option<UserProfile>,
    pub requires_registration: bool,
}

impl AuthPayload {
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if a profile is present but malformed.
    pub fn from_value(raw: JsonValue) -> Result<Self, Error> {
        let access_token = raw
            .get("accessToken")
            .and_then(JsonValue::as_str)
            .filter(|t| !t.is_empty())
            .map(AccessToken::from);
        let requires_registration = raw
            .get("requiresRegistration")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false);

        let carries_profile = raw.get("profile").is_some_and(JsonValue::is_object)
            || raw.get("email").is_some();
        let profile = if carries_profile {
            Some(UserProfile::from_value(raw)?)
        } else {
            None
        };

        Ok(Self {
            access_token,
            profile,
            requires_registration,
        })
    }
}

fn deserialize_status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<UserStatus>, D::Error> {
    let raw = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => {
            let status = UserStatus::parse(&s);
            if status.is_none() {
                tracing::warn!(status = %s, "Unknown user status; treating as unset");
            }
            status
        }
        Some(other) => {
            tracing::warn!(status = %other, "Non-string user status; treating as unset");
            None
        }
    })
}

/// RFC 3339 timestamps; unparseable values become `None` instead of failing the profile.
mod lenient_rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub(super) fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        time::serde::rfc3339::option::serialize(value, serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| match OffsetDateTime::parse(&s, &Rfc3339) {
            Ok(ts) => Some(ts),
            Err(e) => {
                tracing::debug!(value = %s, error = %e, "Ignoring unparseable timestamp");
                None
            }
        }))
    }
}
