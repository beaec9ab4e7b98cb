//! HTTP header name constants.
//!
//! Header names sent with every analytics batch. The backend rejects batches
//! missing the application key, so these names must match the collector exactly.

/// Content type of every batch body
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
/// Value of the content type header (batches are JSON arrays)
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Authorization header, value supplied by the auth provider
pub const HEADER_AUTHORIZATION: &str = "Authorization";
/// Application key registered with the mobile backend
pub const HEADER_APPLICATION_KEY: &str = "Oracle-Mobile-Application-Key";
/// Device identifier of the installation sending the batch
pub const HEADER_DEVICE_ID: &str = "Oracle-Mobile-Device-ID";
/// Analytics session the batch belongs to
pub const HEADER_ANALYTICS_SESSION_ID: &str = "Oracle-Mobile-Analytics-Session-ID";
/// Mobile backend identifier
pub const HEADER_BACKEND_ID: &str = "Oracle-Mobile-Backend-ID";
/// Diagnostic session (one per proxy lifetime), used to correlate server logs
pub const HEADER_DIAGNOSTIC_SESSION_ID: &str = "Oracle-Mobile-Diagnostic-Session-ID";
