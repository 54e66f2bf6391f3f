//! ---
//! rsbb_section: "02-messaging-ipc-data-model"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Remote service calls towards the referee box."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::debug;

use crate::{MessagingError, Result, ServiceRequest};

/// Number of handled calls kept for inspection; older records are discarded.
pub const CALL_HISTORY_LIMIT: usize = 256;

/// Request/response access to named services.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Wait up to `timeout` for `service` to become reachable.
    async fn wait_for_service(&self, service: &str, timeout: Duration) -> bool;
    /// Invoke `service` once.
    async fn call(&self, service: &str, request: ServiceRequest) -> Result<()>;
    /// Human-readable client name for logging/metrics.
    fn name(&self) -> &'static str;
}

/// Probe `service` for at most `probe_timeout`, then call it.
///
/// Returns [`MessagingError::ServiceUnavailable`] without calling when the
/// probe fails, or the error produced by the call itself.
pub async fn call_with_probe(
    client: &dyn ServiceClient,
    service: &str,
    request: ServiceRequest,
    probe_timeout: Duration,
) -> Result<()> {
    if !client.wait_for_service(service, probe_timeout).await {
        return Err(MessagingError::ServiceUnavailable {
            service: service.to_owned(),
        });
    }
    client.call(service, request).await
}

/// Handler invoked for an in-process service. `Err` carries the failure reason.
pub type ServiceHandler =
    Arc<dyn Fn(&ServiceRequest) -> std::result::Result<(), String> + Send + Sync>;

/// Record of a call that reached a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    /// Service name.
    pub service: String,
    /// Request as received.
    pub request: ServiceRequest,
    /// Whether the handler accepted the call.
    pub accepted: bool,
    /// Time the call was handled.
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryInner {
    handlers: RwLock<HashMap<String, ServiceHandler>>,
    calls: Mutex<VecDeque<ServiceCall>>,
    changed: Notify,
}

/// Service registry living in the same process as its callers.
///
/// Used when no referee box is configured, by the referee stub, and as the
/// referee double in tests.
#[derive(Clone, Default)]
pub struct InProcessServices {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for InProcessServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcessServices")
            .field("services", &self.services())
            .finish_non_exhaustive()
    }
}

impl InProcessServices {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a handler for `service`.
    pub fn advertise<F>(&self, service: impl Into<String>, handler: F)
    where
        F: Fn(&ServiceRequest) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        let service = service.into();
        debug!(service = %service, "service advertised");
        self.inner
            .handlers
            .write()
            .insert(service, Arc::new(handler));
        self.inner.changed.notify_waiters();
    }

    /// Register a handler that accepts every request.
    pub fn advertise_accepting(&self, service: impl Into<String>) {
        self.advertise(service, |_| Ok(()));
    }

    /// True when a handler is registered for `service`.
    pub fn is_available(&self, service: &str) -> bool {
        self.inner.handlers.read().contains_key(service)
    }

    /// Registered service names, sorted.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch a request synchronously.
    pub fn invoke(&self, service: &str, request: ServiceRequest) -> Result<()> {
        let handler = self.inner.handlers.read().get(service).cloned();
        let Some(handler) = handler else {
            return Err(MessagingError::ServiceUnavailable {
                service: service.to_owned(),
            });
        };

        let outcome = handler(&request);
        {
            let mut calls = self.inner.calls.lock();
            if calls.len() == CALL_HISTORY_LIMIT {
                calls.pop_front();
            }
            calls.push_back(ServiceCall {
                service: service.to_owned(),
                request,
                accepted: outcome.is_ok(),
                at: Utc::now(),
            });
        }
        outcome.map_err(|reason| MessagingError::ServiceCallFailed {
            service: service.to_owned(),
            reason,
        })
    }

    /// The most recent calls (up to [`CALL_HISTORY_LIMIT`]), oldest first.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.inner.calls.lock().iter().cloned().collect()
    }

    /// Recorded requests received by one service, oldest first.
    pub fn requests_to(&self, service: &str) -> Vec<ServiceRequest> {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|call| call.service == service)
            .map(|call| call.request.clone())
            .collect()
    }
}

#[async_trait]
impl ServiceClient for InProcessServices {
    async fn wait_for_service(&self, service: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before checking so a concurrent advertise is not missed.
            let changed = self.inner.changed.notified();
            if self.is_available(service) {
                return true;
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return self.is_available(service);
            }
        }
    }

    async fn call(&self, service: &str, request: ServiceRequest) -> Result<()> {
        self.invoke(service, request)
    }

    fn name(&self) -> &'static str {
        "in_process"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Pose2D, ResultPayload};

    const END_PREPARE: &str = "/roah_rsbb/end_prepare";

    #[tokio::test(start_paused = true)]
    async fn probe_times_out_when_service_missing() {
        let services = InProcessServices::new();
        let err = call_with_probe(
            &services,
            END_PREPARE,
            ServiceRequest::Empty,
            Duration::from_millis(100),
        )
        .await
        .expect_err("service missing");
        assert!(matches!(err, MessagingError::ServiceUnavailable { .. }));
        assert!(services.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_sees_late_registration() {
        let services = InProcessServices::new();
        let registrar = services.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            registrar.advertise_accepting(END_PREPARE);
        });
        assert!(
            services
                .wait_for_service(END_PREPARE, Duration::from_millis(100))
                .await
        );
    }

    #[tokio::test]
    async fn handler_failure_is_reported_and_recorded() {
        let services = InProcessServices::new();
        services.advertise(END_PREPARE, |_| Err("referee rejected".to_owned()));
        let err = call_with_probe(
            &services,
            END_PREPARE,
            ServiceRequest::Empty,
            Duration::from_millis(100),
        )
        .await
        .expect_err("handler fails");
        match err {
            MessagingError::ServiceCallFailed { service, reason } => {
                assert_eq!(service, END_PREPARE);
                assert_eq!(reason, "referee rejected");
            }
            other => panic!("unexpected error {other:?}"),
        }
        let calls = services.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].accepted);
    }

    #[test]
    fn requests_are_filtered_by_service() {
        let services = InProcessServices::new();
        services.advertise_accepting("/a");
        services.advertise_accepting("/b");
        let payload = ResultPayload {
            object_class: "cups".into(),
            object_name: "red_cup".into(),
            object_pose: Pose2D {
                x: 0.1,
                y: 0.2,
                theta: 1.23,
            },
        };
        services.invoke("/a", ServiceRequest::Empty).expect("call a");
        services
            .invoke("/b", ServiceRequest::WithResult(payload.clone()))
            .expect("call b");
        assert_eq!(
            services.requests_to("/b"),
            vec![ServiceRequest::WithResult(payload)]
        );
        assert_eq!(services.services(), vec!["/a".to_owned(), "/b".to_owned()]);
    }

    #[test]
    fn call_history_is_bounded() {
        let services = InProcessServices::new();
        services.advertise_accepting("/a");
        services.advertise_accepting("/b");
        services.invoke("/a", ServiceRequest::Empty).expect("first call");
        for _ in 0..CALL_HISTORY_LIMIT {
            services.invoke("/b", ServiceRequest::Empty).expect("call b");
        }
        let calls = services.calls();
        assert_eq!(calls.len(), CALL_HISTORY_LIMIT);
        assert!(services.requests_to("/a").is_empty());
        assert!(calls.iter().all(|call| call.service == "/b"));
    }
}
