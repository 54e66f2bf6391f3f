//! ---
//! rsbb_section: "02-messaging-ipc-data-model"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "In-process publish/subscribe bus."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::logging::{log_message, MessageDirection, MessagingMetricsExporter};
use crate::qos::{HistoryQueue, QoSProfile};
use crate::{Message, MessagePayload, MessagingError, Result};

/// Snapshot of bus counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessagingMetrics {
    /// Messages accepted by [`MessageBus::publish`].
    pub published: u64,
    /// Messages handed to subscribers.
    pub delivered: u64,
    /// Messages displaced from a subscriber queue before delivery.
    pub overwritten: u64,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    overwritten: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> MessagingMetrics {
        MessagingMetrics {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
        }
    }
}

struct SubscriberQueue {
    history: Mutex<HistoryQueue>,
    notify: Notify,
    closed: AtomicBool,
}

impl SubscriberQueue {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

#[derive(Default)]
struct TopicState {
    qos: QoSProfile,
    sequence: u64,
    retained: Option<Message>,
    subscribers: Vec<Weak<SubscriberQueue>>,
}

#[derive(Default)]
struct BusInner {
    topics: Mutex<HashMap<String, TopicState>>,
    counters: Counters,
    exporter: Option<MessagingMetricsExporter>,
    closed: AtomicBool,
}

/// In-process publish/subscribe bus.
///
/// Each subscription owns one queue that may cover several topics. The queue
/// keeps at most `depth` undelivered messages per topic (newest wins) and
/// hands them out in publish order, so a single consumer sees selection and
/// phase notifications interleaved exactly as they were published.
#[derive(Clone, Default)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("topics", &self.topics())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl MessageBus {
    /// Create a bus without metrics export.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus that also feeds the provided Prometheus counters.
    pub fn with_exporter(exporter: MessagingMetricsExporter) -> Self {
        Self {
            inner: Arc::new(BusInner {
                exporter: Some(exporter),
                ..BusInner::default()
            }),
        }
    }

    /// Declare a topic and its publisher QoS. Re-advertising replaces the QoS
    /// and keeps existing subscribers.
    pub fn advertise(&self, topic: &str, qos: QoSProfile) {
        let mut topics = self.inner.topics.lock();
        let state = topics.entry(topic.to_owned()).or_default();
        state.qos = qos;
        if !qos.is_retained() {
            state.retained = None;
        }
        tracing::debug!(topic, ?qos, "topic advertised");
    }

    /// Publish a payload, returning the per-topic sequence number.
    pub fn publish(&self, topic: &str, payload: MessagePayload) -> Result<u64> {
        if self.is_closed() {
            return Err(MessagingError::BusClosed);
        }

        let mut topics = self.inner.topics.lock();
        let state = topics.entry(topic.to_owned()).or_default();
        state.sequence = state.sequence.wrapping_add(1);
        let mut message = Message::new(topic, payload);
        message.sequence = state.sequence;
        log_message(MessageDirection::Outbound, &message);

        state.subscribers.retain(|weak| weak.strong_count() > 0);
        for subscriber in state.subscribers.iter().filter_map(Weak::upgrade) {
            let evicted = subscriber.history.lock().push(message.clone());
            if let Some(evicted) = evicted {
                log_message(MessageDirection::Overwritten, &evicted);
                self.inner.counters.overwritten.fetch_add(1, Ordering::Relaxed);
                if let Some(exporter) = &self.inner.exporter {
                    exporter.observe_overwritten();
                }
            }
            subscriber.notify.notify_one();
        }

        if state.qos.is_retained() {
            state.retained = Some(message);
        }

        self.inner.counters.published.fetch_add(1, Ordering::Relaxed);
        if let Some(exporter) = &self.inner.exporter {
            exporter.observe_published();
        }
        Ok(state.sequence)
    }

    /// Subscribe to one or more topics with a per-topic queue depth. Retained
    /// messages on those topics are queued immediately.
    pub fn subscribe(&self, topics: &[&str], depth: usize) -> Subscription {
        let queue = Arc::new(SubscriberQueue {
            history: Mutex::new(HistoryQueue::new(depth)),
            notify: Notify::new(),
            closed: AtomicBool::new(self.is_closed()),
        });

        let mut registered = self.inner.topics.lock();
        for topic in topics {
            let state = registered.entry((*topic).to_owned()).or_default();
            state.subscribers.push(Arc::downgrade(&queue));
            if let Some(retained) = &state.retained {
                queue.history.lock().push(retained.clone());
                queue.notify.notify_one();
            }
        }
        drop(registered);

        Subscription {
            queue,
            topics: topics.iter().map(|topic| (*topic).to_owned()).collect(),
            bus: self.inner.clone(),
        }
    }

    /// Last retained message on a topic.
    pub fn latest(&self, topic: &str) -> Option<Message> {
        self.inner
            .topics
            .lock()
            .get(topic)
            .and_then(|state| state.retained.clone())
    }

    /// Names of all known topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.topics.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Return the current metrics snapshot.
    pub fn metrics(&self) -> MessagingMetrics {
        self.inner.counters.snapshot()
    }

    /// Refuse further publishes and wake every subscriber with end-of-stream.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let topics = self.inner.topics.lock();
        for state in topics.values() {
            for subscriber in state.subscribers.iter().filter_map(Weak::upgrade) {
                subscriber.close();
            }
        }
    }

    /// True after [`MessageBus::close`].
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// Receiving end of a bus subscription.
pub struct Subscription {
    queue: Arc<SubscriberQueue>,
    topics: Vec<String>,
    bus: Arc<BusInner>,
}

impl Subscription {
    /// Wait for the next message. Returns `None` once the bus is closed and
    /// the queue has drained. Cancel safe.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            if let Some(message) = self.try_recv() {
                return Some(message);
            }
            if self.queue.closed.load(Ordering::Acquire) {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Take the next queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        let message = self.queue.history.lock().pop()?;
        log_message(MessageDirection::Inbound, &message);
        self.bus.counters.delivered.fetch_add(1, Ordering::Relaxed);
        if let Some(exporter) = &self.bus.exporter {
            exporter.observe_delivered();
        }
        Some(message)
    }

    /// Topics covered by this subscription.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Messages this subscriber lost to newer ones.
    pub fn overwritten(&self) -> u64 {
        self.queue.history.lock().overwritten()
    }
}
