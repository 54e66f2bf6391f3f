//! ---
//! rsbb_section: "02-messaging-ipc-data-model"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Bus activity logging and Prometheus counters."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use prometheus::{IntCounter, Opts, Registry};
use tracing::debug;

use crate::types::Message;

/// Direction of the message movement, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    /// Message published onto the bus.
    Outbound,
    /// Message handed to a subscriber.
    Inbound,
    /// Message displaced by a newer one before delivery.
    Overwritten,
}

/// Emit a structured log entry for message activity.
pub fn log_message(direction: MessageDirection, message: &Message) {
    debug!(
        message_id = %message.id,
        topic = %message.topic,
        sequence = message.sequence,
        kind = message.kind(),
        schema_version = message.schema_version,
        direction = ?direction,
        "bus activity"
    );
}

/// Prometheus metric handles for bus activity.
#[derive(Clone)]
pub struct MessagingMetricsExporter {
    published: IntCounter,
    delivered: IntCounter,
    overwritten: IntCounter,
}

impl MessagingMetricsExporter {
    /// Register bus metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let published = IntCounter::with_opts(Opts::new(
            "rsbb_messages_published_total",
            "Messages published on the in-process bus",
        ))?;
        let delivered = IntCounter::with_opts(Opts::new(
            "rsbb_messages_delivered_total",
            "Messages consumed by subscribers",
        ))?;
        let overwritten = IntCounter::with_opts(Opts::new(
            "rsbb_messages_overwritten_total",
            "Messages displaced from a full subscriber queue before delivery",
        ))?;

        registry.register(Box::new(published.clone()))?;
        registry.register(Box::new(delivered.clone()))?;
        registry.register(Box::new(overwritten.clone()))?;

        Ok(Self {
            published,
            delivered,
            overwritten,
        })
    }

    /// Record a published message.
    pub fn observe_published(&self) {
        self.published.inc();
    }

    /// Record a delivered message.
    pub fn observe_delivered(&self) {
        self.delivered.inc();
    }

    /// Record an overwritten message.
    pub fn observe_overwritten(&self) {
        self.overwritten.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_exporter_records_counts() {
        let registry = Registry::new();
        let metrics = MessagingMetricsExporter::register(&registry).expect("register metrics");
        metrics.observe_published();
        metrics.observe_delivered();
        metrics.observe_overwritten();

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "rsbb_messages_overwritten_total"));
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry = Registry::new();
        MessagingMetricsExporter::register(&registry).expect("first registration");
        assert!(MessagingMetricsExporter::register(&registry).is_err());
    }
}
