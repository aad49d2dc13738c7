//! Backend paths consumed by the client.

pub const REFRESH: &str = "/public/auth/refresh";
pub const LOGIN: &str = "/public/auth/login";
pub const LOGOUT: &str = "/public/auth/logout";
pub const GOOGLE_CODE: &str = "/public/auth/google/code";
pub const REGISTER_PUBLIC: &str = "/public/users/register";
pub const RESEND_VERIFICATION: &str = "/public/email/resend-verification";
pub const VERIFY_EMAIL: &str = "/public/verify-email";
pub const COMPLETE_REGISTRATION: &str = "/users/register";
pub const ME: &str = "/me";

/// Strips any query string so paths compare by route only.
pub(crate) fn route_of(path: &str) -> &str {
    path.split_once('?').map_or(path, |(route, _)| route)
}
