use thiserror::Error;

/// Errors surfaced by the session and API layer.
///
/// Nothing here is retried automatically: configuration and callback errors
/// are terminal for the current operation, and API or network failures are
/// shown to the user, who may retry manually.
#[derive(Error, Debug)]
pub enum Error {
    #[error("API base URL is not configured. Set API_BASE_URL or BACKEND_URL.")]
    Configuration,

    #[error("Not authenticated")]
    Authentication,

    #[error("Missing authentication data")]
    CallbackValidation,

    #[error("{0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Credential storage failed: {0}")]
    Storage(String),
}
