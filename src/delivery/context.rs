//! Shared delivery resources.
//!
//! One `DeliveryContext` lives as long as the owning proxy and is shared by
//! every upload task through an `Arc`. The durable store is injected here
//! rather than reached through a global.

use std::sync::Arc;

use super::locks::BackendLocks;
use crate::batch::{DeviceInfoProvider, LocationCache, StaticDeviceInfo};
use crate::config::{
    AnalyticsConfig, CONTENT_TYPE_JSON, HEADER_ANALYTICS_SESSION_ID, HEADER_APPLICATION_KEY,
    HEADER_AUTHORIZATION, HEADER_BACKEND_ID, HEADER_CONTENT_TYPE, HEADER_DEVICE_ID,
    HEADER_DIAGNOSTIC_SESSION_ID,
};
use crate::error_handling::{AnalyticsError, DeliveryStats};
use crate::storage::FailedBatchStore;
use crate::transport::{AlwaysOnline, AuthProvider, NetworkMonitor, NoAuthorization, Transport};

/// Per-backend delivery settings derived from `AnalyticsConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    pub backend_id: String,
    pub events_url: String,
    pub application_key: String,
    pub device_id: String,
    pub component: String,
    pub accepted_status: u16,
    /// Correlates all requests of one proxy lifetime in server-side diagnostics
    pub diagnostic_session_id: String,
}

impl DeliverySettings {
    /// Derives settings from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Config` when the configuration is invalid.
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        Ok(DeliverySettings {
            backend_id: config.backend_id.clone(),
            events_url: config.events_url()?.to_string(),
            application_key: config.application_key.clone(),
            device_id: config.device_id.clone(),
            component: config.component.clone(),
            accepted_status: config.accepted_status,
            diagnostic_session_id: uuid::Uuid::new_v4().to_string(),
        })
    }
}

/// Collaborators and shared state used by upload tasks and replays.
pub struct DeliveryContext {
    pub settings: DeliverySettings,
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn FailedBatchStore>,
    pub network: Arc<dyn NetworkMonitor>,
    pub auth: Arc<dyn AuthProvider>,
    pub device: Arc<dyn DeviceInfoProvider>,
    pub location: Arc<LocationCache>,
    pub locks: BackendLocks,
    pub stats: Arc<DeliveryStats>,
}

impl DeliveryContext {
    /// Creates a context that is always online, sends no `Authorization`
    /// header and reports default device info.
    pub fn new(
        settings: DeliverySettings,
        transport: Arc<dyn Transport>,
        store: Arc<dyn FailedBatchStore>,
    ) -> Self {
        DeliveryContext {
            settings,
            transport,
            store,
            network: Arc::new(AlwaysOnline),
            auth: Arc::new(NoAuthorization),
            device: Arc::new(StaticDeviceInfo::default()),
            location: Arc::new(LocationCache::new()),
            locks: BackendLocks::new(),
            stats: Arc::new(DeliveryStats::new()),
        }
    }

    pub fn with_network(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
        self.network = network;
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_device(mut self, device: Arc<dyn DeviceInfoProvider>) -> Self {
        self.device = device;
        self
    }

    /// Headers for a batch of `session_id`.
    pub fn batch_headers(&self, session_id: &str) -> Vec<(String, String)> {
        build_headers(&self.settings, session_id, self.auth.as_ref())
    }
}

/// Assembles the request headers of one batch.
pub fn build_headers(
    settings: &DeliverySettings,
    session_id: &str,
    auth: &dyn AuthProvider,
) -> Vec<(String, String)> {
    let mut headers = vec![(
        HEADER_CONTENT_TYPE.to_string(),
        CONTENT_TYPE_JSON.to_string(),
    )];
    if let Some(authorization) = auth.authorization() {
        headers.push((HEADER_AUTHORIZATION.to_string(), authorization));
    }
    headers.extend([
        (
            HEADER_APPLICATION_KEY.to_string(),
            settings.application_key.clone(),
        ),
        (HEADER_DEVICE_ID.to_string(), settings.device_id.clone()),
        (HEADER_ANALYTICS_SESSION_ID.to_string(), session_id.to_string()),
        (HEADER_BACKEND_ID.to_string(), settings.backend_id.clone()),
        (
            HEADER_DIAGNOSTIC_SESSION_ID.to_string(),
            settings.diagnostic_session_id.clone(),
        ),
    ]);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StaticAuthorization;

    fn settings() -> DeliverySettings {
        DeliverySettings::from_config(&AnalyticsConfig {
            backend_id: "backend-1".to_string(),
            base_url: "https://mcs.example.com".to_string(),
            application_key: "app-key".to_string(),
            device_id: "device-9".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_settings_from_config() {
        let settings = settings();
        assert_eq!(
            settings.events_url,
            "https://mcs.example.com/mobile/platform/analytics/events"
        );
        assert_eq!(settings.accepted_status, 202);
        assert!(!settings.diagnostic_session_id.is_empty());
    }

    #[test]
    fn test_settings_reject_invalid_config() {
        let result = DeliverySettings::from_config(&AnalyticsConfig::default());
        assert!(matches!(result, Err(AnalyticsError::Config(_))));
    }

    #[test]
    fn test_build_headers_with_auth() {
        let headers = build_headers(
            &settings(),
            "session-1",
            &StaticAuthorization::new("Basic Zm9vOmJhcg=="),
        );
        assert_eq!(headers[0], ("Content-Type".to_string(), "application/json".to_string()));
        assert_eq!(value(&headers, "Authorization"), Some("Basic Zm9vOmJhcg=="));
        assert_eq!(value(&headers, "Oracle-Mobile-Application-Key"), Some("app-key"));
        assert_eq!(value(&headers, "Oracle-Mobile-Device-ID"), Some("device-9"));
        assert_eq!(
            value(&headers, "Oracle-Mobile-Analytics-Session-ID"),
            Some("session-1")
        );
        assert_eq!(value(&headers, "Oracle-Mobile-Backend-ID"), Some("backend-1"));
        assert!(value(&headers, "Oracle-Mobile-Diagnostic-Session-ID").is_some());
    }

    #[test]
    fn test_build_headers_without_auth() {
        let headers = build_headers(&settings(), "session-1", &NoAuthorization);
        assert!(value(&headers, "Authorization").is_none());
        assert_eq!(headers.len(), 6);
    }
}
