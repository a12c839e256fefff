//! API client for the onboarding backend.
//!
//! Every request carries the stored bearer credential and a JSON content
//! type. The credential is re-read from the store on each call, so a
//! sign-out between calls turns the next call into an authentication error
//! instead of a request with a stale token.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::credentials::CredentialStore;
use crate::config::Config;
use crate::error::Error;

/// Fallback message when an error body carries no usable detail
const GENERIC_API_ERROR: &str = "API request failed";

/// Structured error detail returned by the backend on failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// API client for the onboarding backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Option<String>,
    store: Arc<CredentialStore>,
}

impl ApiClient {
    pub fn new(config: &Config, store: Arc<CredentialStore>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_base_url.clone(),
            store,
        }
    }

    /// Join the base endpoint and path with exactly one separator,
    /// regardless of whether either side already carries one.
    fn join_url(base: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Extract the backend's error detail from a failure body, falling back
    /// to a generic message when the body is not decodable.
    fn error_detail(body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.detail)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| GENERIC_API_ERROR.to_string())
    }

    /// Make one authenticated request and decode the JSON response.
    ///
    /// Fails with a configuration error before any network access when the
    /// base URL is unset, and with an authentication error when no credential
    /// is stored. Caller-supplied headers are merged in, but the
    /// authorization header always wins. No retries, no caching, no dedup:
    /// each call is independent and at-most-once.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Value, Error> {
        let base = self.base_url.as_deref().ok_or(Error::Configuration)?;
        let credential = self.store.get().ok_or(Error::Authentication)?;

        let mut header_map = headers.unwrap_or_default();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.access_token))
            .map_err(|_| Error::Authentication)?;
        header_map.insert(AUTHORIZATION, bearer);

        let url = Self::join_url(base, path);
        debug!(%method, %url, "API request");

        let mut request = self.client.request(method, &url).headers(header_map);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %url, "API request failed");
            return Err(Error::Api(Self::error_detail(&body)));
        }

        // Decoded as-is; schema validation is the caller's responsibility
        Ok(response.json().await?)
    }

    // ===== Exposed operations =====

    /// Fetch the user's imported transactions.
    pub async fn get_transactions(&self) -> Result<Value, Error> {
        self.call(Method::GET, "/transactions", None, None).await
    }

    /// Fetch the spending summary.
    pub async fn get_summary(&self) -> Result<Value, Error> {
        self.call(Method::GET, "/summary", None, None).await
    }

    /// Trigger a mailbox sync on the backend.
    pub async fn sync_emails(&self) -> Result<Value, Error> {
        self.call(Method::POST, "/email/sync", None, None).await
    }

    /// Fetch the external-provider login URL used for account linking.
    pub async fn get_google_login_url(&self) -> Result<Value, Error> {
        self.call(Method::GET, "/auth/google/login", None, None).await
    }
}
