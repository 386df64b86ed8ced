//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

use crate::error::LlmError;

/// Build the HTTP client used for chat-completion requests.
///
/// Bounds the connect phase and the gap between reads, never the whole
/// request, so a long streamed answer is not cut off.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(LlmError::Http)
}

/// Client with the default 30s connect / 120s read timeouts.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn default_client() -> Result<reqwest::Client, LlmError> {
    build_client(Duration::from_secs(30), Duration::from_secs(120))
}
