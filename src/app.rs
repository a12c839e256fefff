//! Onboarding flow coordination.
//!
//! Ties the session state machine, credential store, and API client together
//! for the pages of the onboarding flow: the guarded-page mount check, the
//! dashboard data load, and the account-linking and email-sync actions.
//!
//! Failures of user-triggered actions are caught here and converted into a
//! state/message pair for the rendering layer; they never propagate uncaught.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::auth::callback::{self, CallbackParams};
use crate::auth::credentials::CredentialStore;
use crate::auth::session::{GuardOutcome, Route, SessionManager, SessionState};
use crate::config::Config;
use crate::error::Error;

pub struct OnboardingFlow {
    pub session: SessionManager,
    pub api: ApiClient,
    routes: UnboundedReceiver<Route>,

    /// Transactions payload for the dashboard, as returned by the backend
    pub transactions: Option<Value>,
    /// Summary payload for the dashboard, as returned by the backend
    pub summary: Option<Value>,
    /// Inline message for the rendering layer, e.g. a failed sync
    pub message: Option<String>,

    /// A sync is outstanding; the trigger stays disabled until it completes
    pub syncing: bool,
    /// Dashboard data has been fetched for the current authenticated session
    dashboard_loaded: bool,
}

impl OnboardingFlow {
    /// Build the flow with the file-backed credential store and the given
    /// configuration.
    pub fn new(config: Config) -> Result<Self, Error> {
        let store = Arc::new(CredentialStore::new()?);
        Ok(Self::with_store(config, store))
    }

    /// Build the flow around an injected store (tests use the in-memory one).
    pub fn with_store(config: Config, store: Arc<CredentialStore>) -> Self {
        let (session, routes) = SessionManager::new(Arc::clone(&store));
        let api = ApiClient::new(&config, store);
        Self {
            session,
            api,
            routes,
            transactions: None,
            summary: None,
            message: None,
            syncing: false,
            dashboard_loaded: false,
        }
    }

    /// Guarded-page mount check. Runs before any data is requested; when it
    /// redirects, no API call is made. Re-evaluated on every mount.
    pub fn mount(&mut self) -> GuardOutcome {
        let outcome = self.session.check_guard();
        if outcome == GuardOutcome::RedirectToSignIn {
            self.dashboard_loaded = false;
        }
        outcome
    }

    /// Entry point for the auth callback page: parse the redirect query and
    /// run the callback handler.
    pub fn handle_callback(&mut self, query: &str) -> &SessionState {
        let params = CallbackParams::from_query(query);
        callback::handle(&mut self.session, &params)
    }

    /// Fetch transactions and summary for the dashboard.
    ///
    /// Fires once per transition into the authenticated state: further calls
    /// while still authenticated are no-ops, and signing out and back in
    /// fetches again. Returns the guard outcome so callers know whether a
    /// redirect was issued instead.
    pub async fn load_dashboard(&mut self) -> GuardOutcome {
        if self.mount() == GuardOutcome::RedirectToSignIn {
            debug!("Dashboard mount without session, redirecting to sign-in");
            return GuardOutcome::RedirectToSignIn;
        }
        if self.dashboard_loaded {
            return GuardOutcome::Allow;
        }

        match self.fetch_dashboard().await {
            Ok(()) => {
                self.dashboard_loaded = true;
                GuardOutcome::Allow
            }
            Err(Error::Authentication) => {
                // Credential vanished mid-flight; back to sign-in
                self.sign_out();
                GuardOutcome::RedirectToSignIn
            }
            Err(e) => {
                warn!("Dashboard load failed: {}", e);
                self.message = Some(e.to_string());
                GuardOutcome::Allow
            }
        }
    }

    async fn fetch_dashboard(&mut self) -> Result<(), Error> {
        self.transactions = Some(self.api.get_transactions().await?);
        self.summary = Some(self.api.get_summary().await?);
        Ok(())
    }

    /// Trigger a mailbox sync on the backend.
    ///
    /// Guarded at this level: while one sync is outstanding further
    /// invocations are ignored, since the API client itself imposes no dedup.
    /// The flag clears on completion either way, so a failed sync can be
    /// retried manually.
    pub async fn sync_emails(&mut self) {
        if self.syncing {
            debug!("Sync already in flight, ignoring");
            return;
        }
        self.syncing = true;
        self.message = None;

        let result = self.api.sync_emails().await;
        self.syncing = false;

        match result {
            Ok(_) => {
                // Synced mail may change the dashboard; fetch it again on the
                // next load
                self.dashboard_loaded = false;
            }
            Err(Error::Authentication) => {
                self.sign_out();
            }
            Err(e) => {
                warn!("Email sync failed: {}", e);
                self.message = Some(e.to_string());
            }
        }
    }

    /// Begin linking the external email account. Returns the provider URL
    /// the rendering layer should navigate to.
    ///
    /// Failures here, including an authentication failure, are shown inline
    /// rather than bouncing the user off the page.
    pub async fn start_google_link(&mut self) -> Option<String> {
        self.session.begin_authentication();
        self.message = None;

        let result = self.api.get_google_login_url().await;
        match result {
            Ok(value) => match value.get("auth_url").and_then(Value::as_str) {
                Some(url) => Some(url.to_string()),
                None => {
                    warn!("Login URL response missing auth_url");
                    self.message = Some("Login URL unavailable, please try again".to_string());
                    self.session.refresh_from_store();
                    None
                }
            },
            Err(e) => {
                warn!("Account linking failed: {}", e);
                self.message = Some(e.to_string());
                self.session.refresh_from_store();
                None
            }
        }
    }

    /// Explicit sign-out: clears the credential, resets fetched data, and
    /// redirects to sign-in.
    pub fn sign_out(&mut self) {
        self.session.sign_out();
        self.transactions = None;
        self.summary = None;
        self.dashboard_loaded = false;
    }

    /// Next scheduled navigation, if one has fired. Completes the automatic
    /// error-to-unauthenticated transition when its sign-in redirect fires.
    pub fn poll_route(&mut self) -> Option<Route> {
        match self.routes.try_recv() {
            Ok(route) => {
                self.session.route_fired(route);
                Some(route)
            }
            Err(_) => None,
        }
    }
}
