use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::Error;
use crate::profile::UserProfile;

/// Claims read from a Google identity token.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct IdTokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Decode the payload segment of a JWT identity token.
///
/// The signature is NOT verified. The result is only fit for display until
/// the backend confirms the identity via `/me`.
///
/// # Errors
///
/// Returns [`Error::Token`] if the token is not three dot-separated segments
/// or the payload is not base64url-encoded JSON.
pub fn decode_claims(token: &str) -> Result<IdTokenClaims, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid token format".into()));
    }

    // Some issuers pad; URL_SAFE_NO_PAD rejects padding.
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| Error::Token("invalid payload encoding".into()))?;

    serde_json::from_slice(&payload).map_err(|e| Error::Token(format!("invalid payload: {e}")))
}

/// Build a profile from an identity token (`sub` becomes the id).
///
/// # Errors
///
/// Returns [`Error::Token`] if the token cannot be decoded or carries no email.
pub fn profile_from_id_token(token: &str) -> Result<UserProfile, Error> {
    let claims = decode_claims(token)?;
    let email = claims
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| Error::Token("missing claim: email".into()))?;

    let mut profile = UserProfile::new(email);
    profile.id = claims.sub.map(Into::into);
    profile.name = claims.name;
    profile.picture = claims.picture;
    Ok(profile)
}

#[cfg(test)]
pub(crate) fn unsigned_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}
