//! reqwest-backed transport.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_retry::RetryIf;

use super::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::error_handling::get_retry_strategy;

/// Sends requests with a shared `reqwest::Client`.
///
/// Every HTTP status is returned as a structured response. Only failures that
/// never produced a status (connect errors, timeouts) are retried, with
/// exponential backoff bounded by the caller's retry limit.
#[derive(Clone)]
pub struct HttpTransport {
    client: Arc<reqwest::Client>,
}

impl HttpTransport {
    pub fn new(client: Arc<reqwest::Client>) -> Self {
        HttpTransport { client }
    }

    async fn send_once(
        &self,
        request: &TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.uri)
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        // The request URL may contain status-like digits; keep it out of the message
        let response = builder.send().await.map_err(|e| match e.status() {
            Some(status) => {
                TransportError::with_status(status.as_u16(), e.without_url().to_string())
            }
            None => TransportError::network(e.without_url().to_string()),
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        // The status already arrived, so a broken body still reports it
        let body = response.text().await.map_err(|e| {
            TransportError::with_status(status, format!("failed to read response body: {e}"))
        })?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
        retry_limit: usize,
    ) -> Result<TransportResponse, TransportError> {
        RetryIf::start(
            get_retry_strategy(retry_limit),
            || self.send_once(&request),
            |e: &TransportError| {
                let network_failure = e.status.is_none();
                if network_failure && retry_limit > 0 {
                    log::debug!("Network failure sending to {}: {}", request.uri, e);
                }
                network_failure
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::{classify_send_result, SendOutcome};
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use reqwest::Method;

    fn request(server: &Server) -> TransportRequest {
        TransportRequest {
            method: Method::POST,
            uri: server.url("/events").to_string(),
            headers: vec![("X-Test".to_string(), "1".to_string())],
            body: "[]".to_string(),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_a_structured_response() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/events"),
                request::headers(contains(("x-test", "1"))),
                request::body("[]"),
            ])
            // Statuses are never retried, even with a retry budget
            .times(1)
            .respond_with(status_code(400).body("bad batch")),
        );
        let transport = HttpTransport::new(Arc::new(reqwest::Client::new()));

        let response = transport.send(request(&server), 1).await.unwrap();

        assert_eq!(response.status, 400);
        assert_eq!(response.body, "bad batch");
    }

    #[tokio::test]
    async fn test_connect_failure_has_no_status() {
        let server = Server::run();
        let req = request(&server);
        // Nothing listens on the port once the server is gone
        drop(server);
        let transport = HttpTransport::new(Arc::new(reqwest::Client::new()));

        let err = transport.send(req, 0).await.unwrap_err();

        assert_eq!(err.status, None);
        assert!(err.network);
        assert!(!err.message.is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_is_recoverable_whatever_the_url() {
        let server = Server::run();
        let mut req = request(&server);
        req.uri = server.url("/202/400/405/events").to_string();
        drop(server);
        let transport = HttpTransport::new(Arc::new(reqwest::Client::new()));

        let result = transport.send(req, 0).await;

        let err = result.as_ref().unwrap_err();
        assert!(!err.message.contains("/202/400/405/events"));
        assert_eq!(
            classify_send_result(&result, 202),
            SendOutcome::RecoverableFailure
        );
    }
}
