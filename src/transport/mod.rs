//! Transport and collaborator seams.
//!
//! The pipeline never talks to reqwest directly: it sends `TransportRequest`s
//! through a `Transport`, asks an `AuthProvider` for credentials and a
//! `NetworkMonitor` for connectivity. Tests substitute scripted fakes.

mod http;

use async_trait::async_trait;
use reqwest::Method;
use thiserror::Error;

pub use http::HttpTransport;

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// A structured HTTP response, returned for every status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// A failed transport call.
///
/// `status` is set whenever the transport got far enough to see one (for
/// example the body could not be read after the status line arrived).
/// `network` is set when the transport knows no response arrived at all; the
/// message of such an error is never inspected for status codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub network: bool,
    pub message: String,
}

impl TransportError {
    /// An opaque failure whose outcome is only described by its message.
    pub fn new(message: impl Into<String>) -> Self {
        TransportError {
            status: None,
            network: false,
            message: message.into(),
        }
    }

    /// A request that never got a response (connect error, timeout, offline).
    pub fn network(message: impl Into<String>) -> Self {
        TransportError {
            status: None,
            network: true,
            message: message.into(),
        }
    }

    /// A failure that still carries the HTTP status the server answered with.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        TransportError {
            status: Some(status),
            network: false,
            message: message.into(),
        }
    }
}

/// Sends requests to the mobile backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`, retrying network-level failures up to `retry_limit` extra times.
    ///
    /// Application errors (any HTTP status) come back as `Ok(TransportResponse)`.
    async fn send(
        &self,
        request: TransportRequest,
        retry_limit: usize,
    ) -> Result<TransportResponse, TransportError>;
}

/// Supplies the `Authorization` header value.
pub trait AuthProvider: Send + Sync {
    /// Current header value, or `None` when the request should go out anonymous.
    fn authorization(&self) -> Option<String>;
}

/// Authorization with a fixed header value (basic credentials or a long-lived token).
#[derive(Debug, Clone)]
pub struct StaticAuthorization {
    value: String,
}

impl StaticAuthorization {
    pub fn new(value: impl Into<String>) -> Self {
        StaticAuthorization {
            value: value.into(),
        }
    }
}

impl AuthProvider for StaticAuthorization {
    fn authorization(&self) -> Option<String> {
        Some(self.value.clone())
    }
}

/// No `Authorization` header at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthorization;

impl AuthProvider for NoAuthorization {
    fn authorization(&self) -> Option<String> {
        None
    }
}

/// Reports whether the device currently has network connectivity.
pub trait NetworkMonitor: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity is never known to be unavailable; every send is attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl NetworkMonitor for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display_is_message() {
        let err = TransportError::with_status(503, "Service Unavailable");
        assert_eq!(err.to_string(), "Service Unavailable");
        assert_eq!(err.status, Some(503));
        assert_eq!(TransportError::new("offline").status, None);
        assert!(!TransportError::new("offline").network);
        assert!(TransportError::network("connection refused").network);
    }

    #[test]
    fn test_auth_providers() {
        assert_eq!(
            StaticAuthorization::new("Basic abc").authorization(),
            Some("Basic abc".to_string())
        );
        assert_eq!(NoAuthorization.authorization(), None);
        assert!(AlwaysOnline.is_online());
    }
}
