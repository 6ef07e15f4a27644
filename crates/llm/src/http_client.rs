//! HTTP Client Factory
//!
//! Builds the reqwest client shared by every adapter instance.

use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Build a `reqwest::Client` with the given request timeout.
///
/// Falls back to a default client if the builder rejects the settings.
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "failed to build http client, using defaults");
            reqwest::Client::new()
        }
    }
}
