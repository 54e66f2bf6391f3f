//! ---
//! rsbb_section: "02-messaging-ipc-data-model"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Message schema, bus, and service plumbing."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Messaging primitives for the dummy robot: the referee message schema, an
//! in-process publish/subscribe bus with keep-last queues, and the service
//! client abstraction used to report phase completion.

pub mod bus;
pub mod logging;
pub mod qos;
pub mod service;
pub mod types;

/// Shared result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Errors raised by the bus and by service calls.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// The bus was closed; nothing more can be published.
    #[error("message bus is closed")]
    BusClosed,
    /// The service did not become reachable within the probe timeout.
    #[error("could not find service {service}")]
    ServiceUnavailable {
        /// Service name.
        service: String,
    },
    /// The service was reached but the call failed.
    #[error("error calling service {service}: {reason}")]
    ServiceCallFailed {
        /// Service name.
        service: String,
        /// Failure description from the transport or handler.
        reason: String,
    },
}

impl MessagingError {
    /// Short label used for the `reason` metric dimension.
    pub fn reason_label(&self) -> &'static str {
        match self {
            MessagingError::BusClosed => "bus_closed",
            MessagingError::ServiceUnavailable { .. } => "unavailable",
            MessagingError::ServiceCallFailed { .. } => "call_failed",
        }
    }
}

pub use bus::{MessageBus, MessagingMetrics, Subscription};
pub use logging::{log_message, MessageDirection, MessagingMetricsExporter};
pub use qos::{Durability, HistoryQueue, QoSProfile};
pub use service::{
    call_with_probe, InProcessServices, ServiceCall, ServiceClient, ServiceHandler,
    CALL_HISTORY_LIMIT,
};
pub use types::{
    BenchmarkKind, BenchmarkSelector, Message, MessagePayload, PhaseSignal, Pose2D, ResultPayload,
    ServiceRequest, SCHEMA_VERSION,
};
