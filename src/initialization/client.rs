//! HTTP client initialization.

use std::sync::Arc;
use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::AnalyticsConfig;
use crate::error_handling::InitializationError;

/// User-Agent sent with every batch.
pub fn user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Initializes the HTTP client shared by all uploads of a proxy.
///
/// Creates a `reqwest::Client` configured with:
/// - The crate's User-Agent
/// - The per-request timeout from the configuration
/// - Rustls TLS backend (no native TLS)
///
/// Redirects are not followed: the collector answers the POST directly.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if client creation fails.
pub fn init_client(config: &AnalyticsConfig) -> Result<Arc<reqwest::Client>, InitializationError> {
    let client = ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(user_agent())
        .build()?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_crate_and_version() {
        let agent = user_agent();
        assert!(agent.starts_with("mcs_analytics/"));
        assert!(agent.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_init_client_with_default_config() {
        assert!(init_client(&AnalyticsConfig::default()).is_ok());
    }
}
