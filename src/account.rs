//! Sign-in, sign-up and verification flows on top of [`Session`].
//!
//! Every flow funnels its response through [`AuthPayload`] and
//! [`Session::adopt`], so profile normalization happens in exactly one place.

use serde_json::json;

use crate::endpoints;
use crate::error::Error;
use crate::id_token;
use crate::profile::{AuthPayload, UserProfile};
use crate::registration::{CompletionForm, RegistrationOutcome, SignUpForm};
use crate::session::Session;
use crate::transport::{Method, Transport};

impl<T: Transport> Session<T> {
    /// Email/password sign-in.
    ///
    /// # Errors
    ///
    /// Returns the gateway error (e.g. `HTTP 401 — invalid credentials`), or
    /// [`Error::Profile`] if the response carries no usable profile.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, Error> {
        let body = json!({ "email": email.trim(), "password": password });
        let raw = self.call(Method::Post, endpoints::LOGIN, Some(body)).await?;
        let profile = self.adopt(AuthPayload::from_value(raw)?)?;
        tracing::info!(status = ?profile.status, "Signed in with password");
        Ok(profile)
    }

    /// Exchange a Google authorization code.
    ///
    /// The backend may answer without an access token and with
    /// `requiresRegistration`; the profile is still adopted and the session
    /// reports [`Pending`](crate::RegistrationMode::Pending).
    ///
    /// # Errors
    ///
    /// Returns the gateway error or [`Error::Profile`].
    pub async fn exchange_google_code(&self, code: &str) -> Result<UserProfile, Error> {
        let body = json!({ "code": code });
        let raw = self.call(Method::Post, endpoints::GOOGLE_CODE, Some(body)).await?;
        let payload = AuthPayload::from_value(raw)?;
        let requires_registration = payload.requires_registration;
        let profile = self.adopt(payload)?;
        tracing::info!(requires_registration, "Signed in with Google");
        Ok(profile)
    }

    /// Public sign-up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before any request if the form is
    /// incomplete, otherwise the gateway error.
    pub async fn register(&self, form: &SignUpForm) -> Result<RegistrationOutcome, Error> {
        form.validate()?;
        let body = serde_json::to_value(form.body())?;
        let raw = self.call(Method::Post, endpoints::REGISTER_PUBLIC, Some(body)).await?;
        let payload = AuthPayload::from_value(raw)?;

        if payload.access_token.is_some() && payload.profile.is_some() {
            let profile = self.adopt(payload)?;
            tracing::info!("Registered and signed in");
            return Ok(RegistrationOutcome::Activated(profile));
        }

        tracing::info!("Registered; awaiting email verification");
        Ok(RegistrationOutcome::VerificationSent {
            email: form.email.trim().to_owned(),
        })
    }

    /// Ask the backend to mail a new verification link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank email, otherwise the gateway error.
    pub async fn resend_verification(&self, email: &str) -> Result<(), Error> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::Validation("Enter your email first.".into()));
        }
        self.call(
            Method::Post,
            endpoints::RESEND_VERIFICATION,
            Some(json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    /// Redeem an email verification token; the backend activates the account and signs in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank token, otherwise the gateway
    /// error (an expired link surfaces as a `4xx`).
    pub async fn verify_email(&self, token: &str) -> Result<UserProfile, Error> {
        if token.trim().is_empty() {
            return Err(Error::Validation("Verification token missing.".into()));
        }
        let path = format!(
            "{}?token={}",
            endpoints::VERIFY_EMAIL,
            urlencoding::encode(token.trim())
        );
        let raw = self.call(Method::Get, &path, None).await?;
        let profile = self.adopt(AuthPayload::from_value(raw)?)?;
        tracing::info!("Email verified");
        Ok(profile)
    }

    /// Complete a `Pending` registration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the terms were not accepted, otherwise
    /// the gateway error.
    pub async fn complete_registration(&self, form: &CompletionForm) -> Result<UserProfile, Error> {
        form.validate()?;
        let body = serde_json::to_value(form.body())?;
        let raw = self
            .call(Method::Post, endpoints::COMPLETE_REGISTRATION, Some(body))
            .await?;
        let profile = self.adopt(AuthPayload::from_value(raw)?)?;
        tracing::info!(status = ?profile.status, "Registration completed");
        Ok(profile)
    }

    /// Legacy sign-in from a Google identity token, without a backend round-trip.
    ///
    /// No access token is minted, so the session stays
    /// [`Public`](crate::RegistrationMode::Public) until a real sign-in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the token cannot be decoded.
    pub fn sign_in_with_id_token(&self, token: &str) -> Result<UserProfile, Error> {
        let profile = id_token::profile_from_id_token(token)?;
        self.store_user(Some(profile.clone()), false);
        Ok(profile)
    }
}
