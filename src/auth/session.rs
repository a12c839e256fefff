//! Session state machine and scheduled navigation.
//!
//! The session is always in one of four states: `Unauthenticated`,
//! `Authenticating`, `Authenticated`, or `Error`. State is derived from the
//! credential store, which stays the single source of truth; the manager
//! holds the last derived state and applies explicit transitions.
//!
//! Navigations out of transient states are scheduled, not fired directly:
//! scheduling replaces any pending navigation, so a stale redirect from an
//! earlier transition can never fire after a later, different one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::credentials::{Credential, CredentialStore};

/// Delay before the sign-in redirect fires after an authentication error,
/// giving the error screen time to render before the user can retry.
pub const ERROR_REDIRECT_DELAY: Duration = Duration::from_secs(3);

/// Delay before the onboarding redirect fires after a successful callback,
/// giving the success indicator time to render.
pub const SUCCESS_REDIRECT_DELAY: Duration = Duration::from_millis(500);

/// Where a scheduled navigation should take the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The sign-in entry point
    SignIn,
    /// The onboarding entry point shown after authentication
    Onboarding,
}

/// Session state, derived from the credential store.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    /// An external login or link redirect is in progress
    Authenticating,
    Authenticated(Credential),
    /// Authentication failed; resolves to `Unauthenticated` when the
    /// scheduled sign-in redirect fires
    Error(String),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Outcome of a guarded page's mount check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    RedirectToSignIn,
}

/// Cancellable scheduled navigation.
///
/// Scheduling spawns the delay task on the ambient tokio runtime, so
/// `schedule` (and every transition that schedules: the callback handler,
/// `complete_authentication`, `fail_authentication`, `sign_out`) must be
/// called from within a runtime context.
pub struct RedirectScheduler {
    tx: UnboundedSender<Route>,
    pending: Option<JoinHandle<()>>,
}

impl RedirectScheduler {
    /// Create a scheduler and the receiver the rendering layer drains.
    pub fn new() -> (Self, UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, pending: None }, rx)
    }

    /// Schedule a navigation after `delay`, replacing any pending one.
    /// Panics when called outside a tokio runtime context.
    pub fn schedule(&mut self, route: Route, delay: Duration) {
        self.cancel();
        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(route);
        }));
        debug!(?route, ?delay, "Navigation scheduled");
    }

    /// Cancel the pending navigation, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Emit a navigation immediately, replacing any pending one.
    pub fn redirect_now(&mut self, route: Route) {
        self.cancel();
        let _ = self.tx.send(route);
    }
}

impl Drop for RedirectScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct SessionManager {
    store: Arc<CredentialStore>,
    state: SessionState,
    scheduler: RedirectScheduler,
}

impl SessionManager {
    /// Build the manager, deriving the initial state from the store.
    /// `Authenticating` and `Error` are never initial states.
    pub fn new(store: Arc<CredentialStore>) -> (Self, UnboundedReceiver<Route>) {
        let (scheduler, routes) = RedirectScheduler::new();
        let state = match store.get() {
            Some(credential) => SessionState::Authenticated(credential),
            None => SessionState::Unauthenticated,
        };
        (
            Self {
                store,
                state,
                scheduler,
            },
            routes,
        )
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// A page is initiating an external login or link redirect.
    pub fn begin_authentication(&mut self) {
        self.scheduler.cancel();
        self.state = SessionState::Authenticating;
        debug!("Session authenticating");
    }

    /// The callback handler persisted a credential. Schedules the onboarding
    /// navigation after a short delay so a success indicator can render.
    pub fn complete_authentication(&mut self, credential: Credential) {
        info!(user_id = %credential.user_id, "Session authenticated");
        self.state = SessionState::Authenticated(credential);
        self.scheduler.schedule(Route::Onboarding, SUCCESS_REDIRECT_DELAY);
    }

    /// The callback handler received malformed redirect data. Schedules the
    /// sign-in navigation so the user can re-initiate login; there is no
    /// automatic retry.
    pub fn fail_authentication(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "Session error");
        self.state = SessionState::Error(message);
        self.scheduler.schedule(Route::SignIn, ERROR_REDIRECT_DELAY);
    }

    /// Explicit sign-out: clears the credential and redirects to sign-in.
    pub fn sign_out(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear credential on sign-out: {}", e);
        }
        self.state = SessionState::Unauthenticated;
        self.scheduler.redirect_now(Route::SignIn);
    }

    /// Re-derive the session state from the store. A credential cleared
    /// underneath an `Authenticated` session is noticed here.
    pub fn refresh_from_store(&mut self) {
        match self.store.get() {
            Some(credential) => {
                self.state = SessionState::Authenticated(credential);
            }
            None => {
                if self.state.is_authenticated() {
                    debug!("Credential absent, session is no longer authenticated");
                }
                self.state = SessionState::Unauthenticated;
            }
        }
    }

    /// Guarded-page mount check. Idempotent; re-derives state from the store
    /// on every call.
    pub fn check_guard(&mut self) -> GuardOutcome {
        self.refresh_from_store();
        if self.state.is_authenticated() {
            GuardOutcome::Allow
        } else {
            GuardOutcome::RedirectToSignIn
        }
    }

    /// Applied when a scheduled navigation fires, completing the automatic
    /// `Error -> Unauthenticated` transition.
    pub fn route_fired(&mut self, route: Route) {
        if route == Route::SignIn {
            if let SessionState::Error(_) = self.state {
                self.state = SessionState::Unauthenticated;
            }
        }
    }
}
