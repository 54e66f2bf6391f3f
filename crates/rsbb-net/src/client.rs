//! ---
//! rsbb_section: "05-networking-external-interfaces"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "HTTP client for referee box services."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rsbb_msg::{MessagingError, ServiceClient, ServiceRequest};
use tokio::time::Instant;
use tracing::debug;

const PROBE_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Calls referee services exposed as `{base}/services/<name>`.
#[derive(Debug, Clone)]
pub struct HttpServiceClient {
    base: String,
    http: Client,
}

impl HttpServiceClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("rsbb-dummyd/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build referee http client")?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_owned(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn service_url(&self, service: &str) -> String {
        if service.starts_with('/') {
            format!("{}/services{}", self.base, service)
        } else {
            format!("{}/services/{}", self.base, service)
        }
    }
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    async fn wait_for_service(&self, service: &str, timeout: Duration) -> bool {
        let url = self.service_url(service);
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.http.get(&url).timeout(remaining).send().await {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => {
                    debug!(service, status = %response.status(), "service probe rejected");
                }
                Err(err) => debug!(service, error = %err, "service probe failed"),
            }
            let pause = PROBE_RETRY_INTERVAL.min(deadline.saturating_duration_since(Instant::now()));
            tokio::time::sleep(pause).await;
        }
    }

    async fn call(&self, service: &str, request: ServiceRequest) -> rsbb_msg::Result<()> {
        let response = self
            .http
            .post(self.service_url(service))
            .json(&request)
            .send()
            .await
            .map_err(|err| MessagingError::ServiceCallFailed {
                service: service.to_owned(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(MessagingError::ServiceUnavailable {
                service: service.to_owned(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(MessagingError::ServiceCallFailed {
            service: service.to_owned(),
            reason: format!("referee responded {status}: {body}"),
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_urls_join_without_double_slash() {
        let client = HttpServiceClient::new("http://127.0.0.1:7400/").expect("client");
        assert_eq!(client.base_url(), "http://127.0.0.1:7400");
        assert_eq!(
            client.service_url("/roah_rsbb/end_prepare"),
            "http://127.0.0.1:7400/services/roah_rsbb/end_prepare"
        );
        assert_eq!(
            client.service_url("end_execute"),
            "http://127.0.0.1:7400/services/end_execute"
        );
    }

    #[tokio::test]
    async fn probe_fails_fast_without_referee() {
        // Nothing listens on the discard port.
        let client = HttpServiceClient::new("http://127.0.0.1:9").expect("client");
        assert!(
            !client
                .wait_for_service("/roah_rsbb/end_prepare", Duration::from_millis(100))
                .await
        );
    }
}
