//! ---
//! rsbb_section: "02-messaging-ipc-data-model"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Topic quality-of-service and subscriber history."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::collections::VecDeque;

use crate::Message;

/// Whether a topic keeps its last message for late subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Only subscribers present at publish time receive the message.
    #[default]
    Volatile,
    /// The last message is retained and replayed to every new subscriber.
    Retained,
}

/// Publisher-side settings for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QoSProfile {
    /// Durability of published messages.
    pub durability: Durability,
}

impl QoSProfile {
    /// Fire-and-forget topic.
    pub const fn volatile() -> Self {
        Self {
            durability: Durability::Volatile,
        }
    }

    /// Latched topic; late subscribers see the last value.
    pub const fn retained() -> Self {
        Self {
            durability: Durability::Retained,
        }
    }

    /// True when the last message must be replayed to new subscribers.
    pub fn is_retained(&self) -> bool {
        matches!(self.durability, Durability::Retained)
    }
}

impl Default for QoSProfile {
    fn default() -> Self {
        Self::volatile()
    }
}

/// Subscriber queue keeping the newest `depth` messages per topic while
/// preserving arrival order across topics.
#[derive(Debug)]
pub struct HistoryQueue {
    depth: usize,
    messages: VecDeque<Message>,
    overwritten: u64,
}

impl HistoryQueue {
    /// Create a queue; depths below one are raised to one.
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            messages: VecDeque::new(),
            overwritten: 0,
        }
    }

    /// Enqueue a message, returning the message it displaced when the topic
    /// was already at capacity.
    pub fn push(&mut self, message: Message) -> Option<Message> {
        let depth = self.depth;
        let queued = self
            .messages
            .iter()
            .filter(|queued| queued.topic == message.topic)
            .count();

        let evicted = if queued >= depth {
            self.messages
                .iter()
                .position(|queued| queued.topic == message.topic)
                .and_then(|index| self.messages.remove(index))
        } else {
            None
        };
        if evicted.is_some() {
            self.overwritten += 1;
        }

        self.messages.push_back(message);
        evicted
    }

    /// Dequeue the oldest message across all topics.
    pub fn pop(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages dropped because a newer one took their slot.
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BenchmarkSelector, MessagePayload, PhaseSignal};

    fn selection(selector: BenchmarkSelector) -> Message {
        Message::new("/roah_rsbb/benchmark", MessagePayload::Benchmark(selector))
    }

    fn phase(signal: PhaseSignal) -> Message {
        Message::new(
            "/roah_rsbb/benchmark/state",
            MessagePayload::BenchmarkState(signal),
        )
    }

    #[test]
    fn depth_one_keeps_newest_value() {
        let mut queue = HistoryQueue::new(1);
        assert!(queue.push(phase(PhaseSignal::Prepare)).is_none());
        let evicted = queue.push(phase(PhaseSignal::Execute)).expect("prepare evicted");
        assert_eq!(
            evicted.payload,
            MessagePayload::BenchmarkState(PhaseSignal::Prepare)
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.overwritten(), 1);
        assert_eq!(
            queue.pop().map(|m| m.payload),
            Some(MessagePayload::BenchmarkState(PhaseSignal::Execute))
        );
    }

    #[test]
    fn topics_do_not_evict_each_other() {
        let mut queue = HistoryQueue::new(1);
        queue.push(selection(BenchmarkSelector::Hopf));
        queue.push(phase(PhaseSignal::Prepare));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().map(|m| m.kind()), Some("benchmark"));
        assert_eq!(queue.pop().map(|m| m.kind()), Some("benchmark_state"));
        assert!(queue.is_empty());
    }

    #[test]
    fn arrival_order_survives_eviction() {
        let mut queue = HistoryQueue::new(1);
        queue.push(phase(PhaseSignal::Prepare));
        queue.push(selection(BenchmarkSelector::Hwv));
        queue.push(phase(PhaseSignal::Execute));
        // The replacement phase is queued behind the selection that arrived first.
        assert_eq!(queue.pop().map(|m| m.kind()), Some("benchmark"));
        assert_eq!(
            queue.pop().map(|m| m.payload),
            Some(MessagePayload::BenchmarkState(PhaseSignal::Execute))
        );
    }

    #[test]
    fn depth_is_counted_per_topic() {
        let mut queue = HistoryQueue::new(2);
        queue.push(phase(PhaseSignal::Stop));
        queue.push(selection(BenchmarkSelector::Hopf));
        queue.push(phase(PhaseSignal::Prepare));
        queue.push(selection(BenchmarkSelector::Hwv));
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.overwritten(), 0);

        let evicted = queue.push(phase(PhaseSignal::Execute)).expect("oldest phase evicted");
        assert_eq!(evicted.payload, MessagePayload::BenchmarkState(PhaseSignal::Stop));
        assert_eq!(queue.overwritten(), 1);
    }

    #[test]
    fn zero_depth_is_treated_as_one() {
        let mut queue = HistoryQueue::new(0);
        queue.push(phase(PhaseSignal::Prepare));
        assert!(queue.push(phase(PhaseSignal::Execute)).is_some());
    }

    #[test]
    fn retained_profile_reports_durability() {
        assert!(QoSProfile::retained().is_retained());
        assert!(!QoSProfile::default().is_retained());
    }
}
