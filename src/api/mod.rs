//! REST API client module for the onboarding backend.
//!
//! Requests are authenticated with the bearer credential persisted by the
//! auth module; responses are returned as raw JSON for the caller to
//! interpret.

pub mod client;

pub use client::ApiClient;
