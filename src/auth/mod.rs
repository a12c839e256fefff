//! Authentication module for managing the onboarding session.
//!
//! This module provides:
//! - `CredentialStore`: atomic persistence for the session credential
//! - `SessionManager`: the unauthenticated/authenticating/authenticated/error
//!   state machine with scheduled navigation
//! - `callback`: the one-shot handler for the identity provider redirect

pub mod callback;
pub mod credentials;
pub mod session;

pub use callback::CallbackParams;
pub use credentials::{Credential, CredentialStore};
pub use session::{GuardOutcome, Route, SessionManager, SessionState};
