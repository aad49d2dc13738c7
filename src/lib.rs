#![doc = include_str!("../README.md")]

mod account;
pub mod config;
pub mod credential;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod id_token;
pub mod local_store;
pub mod profile;
pub mod refresh;
pub mod registration;
pub mod session;
#[cfg(test)]
mod testing;
pub mod transport;

// Re-exports for convenient access
pub use config::{ClientConfig, ClientHints};
pub use credential::{AccessToken, CredentialStore};
pub use error::Error;
pub use gateway::Gateway;
pub use id_token::{IdTokenClaims, profile_from_id_token};
pub use local_store::{LocalStore, MemoryStore};
pub use profile::{AuthPayload, UserId, UserProfile, UserStatus, normalize};
pub use refresh::RefreshCoordinator;
pub use registration::{
    CompletionForm, RegistrationMode, RegistrationOutcome, RegistrationStep, SignUpForm,
};
pub use session::{Session, SessionState};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{ApiRequest, ApiResponse, Method, Transport};
