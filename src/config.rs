//! Application configuration management.
//!
//! The only required setting is the backend base URL, resolved from the
//! `API_BASE_URL` environment variable with `BACKEND_URL` as a fallback.
//! A missing base URL surfaces as a configuration error on the first API
//! call; it is never a retry condition.

/// Primary environment variable for the backend base URL
const API_BASE_URL_VAR: &str = "API_BASE_URL";

/// Fallback environment variable, checked when the primary is unset
const BACKEND_URL_VAR: &str = "BACKEND_URL";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
}

impl Config {
    /// Build a configuration with an explicit base URL.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: Some(api_base_url.into()),
        }
    }

    /// Resolve configuration from the process environment.
    /// Loads a `.env` file first if one is present (silently ignored if not).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let api_base_url =
            env_non_empty(API_BASE_URL_VAR).or_else(|| env_non_empty(BACKEND_URL_VAR));

        Self { api_base_url }
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
