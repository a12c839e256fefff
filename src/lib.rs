//! Client-side session and authenticated-request layer for the Mono
//! onboarding flow.
//!
//! This crate establishes that a user is authenticated, persists and
//! retrieves the credential, attaches it to outbound API calls, and drives
//! the redirect state machine between the signed-out, authenticating, and
//! onboarded screens:
//!
//! - `CredentialStore`: atomic persistence for the session credential
//! - `SessionManager`: the session state machine with scheduled navigation
//! - `ApiClient`: bearer-authenticated calls to the onboarding backend
//! - `OnboardingFlow`: guarded-page checks plus the account-linking and
//!   email-sync actions built on the client
//!
//! The rendering layer is an external collaborator: it draws whatever state
//! these types expose and performs the navigations they schedule.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;

pub use api::ApiClient;
pub use app::OnboardingFlow;
pub use auth::{
    CallbackParams, Credential, CredentialStore, GuardOutcome, Route, SessionManager, SessionState,
};
pub use config::Config;
pub use error::Error;
