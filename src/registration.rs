use serde::Serialize;

use crate::error::Error;
use crate::profile::UserProfile;

const MIN_PASSWORD_LEN: usize = 8;

/// Where the user stands in the sign-up lifecycle. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationMode {
    /// No session: offer sign-up / sign-in.
    Public,
    /// Identity known, mandatory profile fields missing: route to completion.
    Pending,
    /// Fully registered (a disabled account also lands here).
    Active,
}

impl RegistrationMode {
    /// Derive the mode from the session's user, the envelope's
    /// `requiresRegistration` flag and whether an access token is held.
    #[must_use]
    pub fn derive(
        user: Option<&UserProfile>,
        requires_registration: bool,
        has_credential: bool,
    ) -> Self {
        let Some(user) = user else {
            return Self::Public;
        };
        // The OAuth exchange can demand completion before any token is minted.
        if requires_registration {
            return Self::Pending;
        }
        if !has_credential {
            return Self::Public;
        }
        if user.is_pending() {
            Self::Pending
        } else {
            Self::Active
        }
    }
}

/// Mode plus the entry action's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
    SignUp,
    Complete(CompletionForm),
    Done,
}

impl RegistrationStep {
    #[must_use]
    pub fn enter(mode: RegistrationMode, user: Option<&UserProfile>) -> Self {
        match (mode, user) {
            (RegistrationMode::Pending, Some(user)) => Self::Complete(CompletionForm::prefilled(user)),
            (RegistrationMode::Pending, None) => Self::Complete(CompletionForm::default()),
            (RegistrationMode::Active, _) => Self::Done,
            (RegistrationMode::Public, _) => Self::SignUp,
        }
    }

    #[must_use]
    pub fn mode(&self) -> RegistrationMode {
        match self {
            Self::SignUp => RegistrationMode::Public,
            Self::Complete(_) => RegistrationMode::Pending,
            Self::Done => RegistrationMode::Active,
        }
    }
}

/// Public sign-up form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub phone: String,
    pub notes: String,
    pub agree_to_terms: bool,
}

impl SignUpForm {
    /// Checks run before anything is sent, in the order the form reports them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] with a user-facing message.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.agree_to_terms {
            return Err(Error::Validation("Please agree to the terms to continue.".into()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Name is required.".into()));
        }
        if self.email.trim().is_empty() {
            return Err(Error::Validation("Email is required.".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }
        if self.password != self.password_confirmation {
            return Err(Error::Validation("Passwords do not match.".into()));
        }
        Ok(())
    }

    pub(crate) fn body(&self) -> SignUpBody<'_> {
        SignUpBody {
            name: self.name.trim(),
            email: self.email.trim(),
            password: &self.password,
            phone: &self.phone,
            notes: &self.notes,
            agree_to_terms: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignUpBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
    phone: &'a str,
    notes: &'a str,
    agree_to_terms: bool,
}

/// Completion form for a `Pending` account.
///
/// `name` and `email` are display-only, pre-filled from the server's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
    pub agree_to_terms: bool,
}

impl CompletionForm {
    #[must_use]
    pub fn prefilled(user: &UserProfile) -> Self {
        Self {
            name: user.name.clone().unwrap_or_default(),
            email: user.email.clone(),
            phone: user.phone_number.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the terms were not accepted.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.agree_to_terms {
            return Err(Error::Validation("Please agree to the terms to continue.".into()));
        }
        Ok(())
    }

    pub(crate) fn body(&self) -> CompletionBody<'_> {
        CompletionBody {
            phone: &self.phone,
            notes: &self.notes,
            agree_to_terms: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompletionBody<'a> {
    phone: &'a str,
    notes: &'a str,
    agree_to_terms: bool,
}

/// Result of a public sign-up.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// The backend auto-activated the account and signed the user in.
    Activated(UserProfile),
    /// A verification link was mailed; the session stays anonymous.
    VerificationSent { email: String },
}
