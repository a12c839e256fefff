//! One-shot handler for the redirect back from the identity provider.
//!
//! The provider delivers identity fields as percent-encoded URL query
//! parameters. All four are required; a redirect missing any of them puts
//! the session in the error state without touching the credential store,
//! and the user must re-initiate login.

use tracing::warn;
use url::form_urlencoded;

use crate::auth::credentials::Credential;
use crate::auth::session::{SessionManager, SessionState};
use crate::error::Error;

/// Required query keys on the inbound redirect
const TOKEN_KEY: &str = "token";
const USER_ID_KEY: &str = "user_id";
const EMAIL_KEY: &str = "email";
const NAME_KEY: &str = "name";

/// Identity fields delivered via the redirect URL query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string (without the leading `?`), percent-decoding
    /// each value. Unknown keys are ignored.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                TOKEN_KEY => params.token = Some(value.into_owned()),
                USER_ID_KEY => params.user_id = Some(value.into_owned()),
                EMAIL_KEY => params.email = Some(value.into_owned()),
                NAME_KEY => params.name = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Build a credential if every required field is present and non-empty.
    fn credential(&self) -> Option<Credential> {
        let credential = Credential {
            access_token: self.token.clone()?,
            user_id: self.user_id.clone()?,
            email: self.email.clone()?,
            display_name: self.name.clone()?,
        };
        credential.is_complete().then_some(credential)
    }
}

/// Validate the redirect parameters, persist the credential, and transition
/// the session. Returns the resulting state for the callback page to render.
///
/// Idempotent: handling the same parameters twice stores the same credential;
/// nothing is appended or merged. Malformed callbacks are never retried.
///
/// Both outcomes schedule a navigation, so this must be called from within a
/// tokio runtime context.
pub fn handle<'a>(session: &'a mut SessionManager, params: &CallbackParams) -> &'a SessionState {
    let Some(credential) = params.credential() else {
        warn!("Authentication callback missing required parameters");
        session.fail_authentication(Error::CallbackValidation.to_string());
        return session.state();
    };

    if let Err(e) = session.store().set(&credential) {
        session.fail_authentication(e.to_string());
        return session.state();
    }

    session.complete_authentication(credential);
    session.state()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{CredentialStore, StorageBackend};
    use crate::auth::session::{Route, ERROR_REDIRECT_DELAY};
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn session() -> (SessionManager, UnboundedReceiver<Route>) {
        SessionManager::new(Arc::new(CredentialStore::in_memory()))
    }

    fn valid_params() -> CallbackParams {
        CallbackParams {
            token: Some("abc".to_string()),
            user_id: Some("1".to_string()),
            email: Some("a@b.com".to_string()),
            name: Some("A B".to_string()),
        }
    }

    #[test]
    fn test_from_query_percent_decodes() {
        let params = CallbackParams::from_query("token=abc&user_id=1&email=a%40b.com&name=A%20B");
        assert_eq!(params, valid_params());
    }

    #[test]
    fn test_from_query_ignores_unknown_keys() {
        let params = CallbackParams::from_query("token=abc&state=xyz");
        assert_eq!(params.token.as_deref(), Some("abc"));
        assert!(params.user_id.is_none());
    }

    #[tokio::test]
    async fn test_valid_callback_authenticates_and_persists() {
        let (mut session, _routes) = session();
        session.begin_authentication();

        let params = CallbackParams::from_query("token=abc&user_id=1&email=a%40b.com&name=A%20B");
        let state = handle(&mut session, &params);
        assert!(state.is_authenticated());

        let stored = session.store().get().unwrap();
        assert_eq!(stored.access_token, "abc");
        assert_eq!(stored.user_id, "1");
        assert_eq!(stored.email, "a@b.com");
        assert_eq!(stored.display_name, "A B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_callback_schedules_onboarding_navigation() {
        use crate::auth::session::SUCCESS_REDIRECT_DELAY;

        let (mut session, mut routes) = session();
        handle(&mut session, &valid_params());

        tokio::time::sleep(SUCCESS_REDIRECT_DELAY * 2).await;
        assert_eq!(routes.try_recv().unwrap(), Route::Onboarding);
    }

    #[tokio::test]
    async fn test_missing_param_errors_without_store_write() {
        for missing in ["token", "user_id", "email", "name"] {
            let (mut session, _routes) = session();
            let mut params = valid_params();
            match missing {
                "token" => params.token = None,
                "user_id" => params.user_id = None,
                "email" => params.email = None,
                _ => params.name = None,
            }

            let state = handle(&mut session, &params);
            assert_eq!(
                *state,
                SessionState::Error("Missing authentication data".to_string())
            );
            assert!(session.store().get().is_none());
        }
    }

    #[tokio::test]
    async fn test_empty_param_is_treated_as_missing() {
        let (mut session, _routes) = session();
        let mut params = valid_params();
        params.email = Some(String::new());

        let state = handle(&mut session, &params);
        assert!(matches!(state, SessionState::Error(_)));
        assert!(session.store().get().is_none());
    }

    #[tokio::test]
    async fn test_handle_is_idempotent() {
        let (mut session, _routes) = session();
        handle(&mut session, &valid_params());
        let first = session.store().get().unwrap();

        handle(&mut session, &valid_params());
        let second = session.store().get().unwrap();
        assert_eq!(first, second);
    }

    /// Backend whose writes always fail, for exercising the storage-failure
    /// branch.
    struct FailingBackend;

    impl StorageBackend for FailingBackend {
        fn read(&self) -> Result<Option<String>, Error> {
            Ok(None)
        }

        fn write(&self, _contents: &str) -> Result<(), Error> {
            Err(Error::Storage("disk full".to_string()))
        }

        fn clear(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_failure_errors_with_message_and_schedules_sign_in() {
        let store = Arc::new(CredentialStore::with_backend(Box::new(FailingBackend)));
        let (mut session, mut routes) = SessionManager::new(store);

        let state = handle(&mut session, &valid_params());
        assert_eq!(
            *state,
            SessionState::Error("Credential storage failed: disk full".to_string())
        );
        assert!(session.store().get().is_none());

        tokio::time::sleep(ERROR_REDIRECT_DELAY * 2).await;
        assert_eq!(routes.try_recv().unwrap(), Route::SignIn);
    }

    #[tokio::test]
    async fn test_failed_callback_leaves_existing_credential_untouched() {
        let (mut session, _routes) = session();
        handle(&mut session, &valid_params());
        let stored = session.store().get().unwrap();

        let state = handle(&mut session, &CallbackParams::default());
        assert!(matches!(state, SessionState::Error(_)));
        assert_eq!(session.store().get(), Some(stored));
    }
}
