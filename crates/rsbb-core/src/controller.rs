//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Robot controller owning the active benchmark slot."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use rsbb_common::config::TopicConfig;
use rsbb_logging::{log_lifecycle_event, rsbb_debug, rsbb_warn, LifecycleOutcome, LogContext};
use rsbb_msg::{
    BenchmarkKind, BenchmarkSelector, Message, MessageBus, MessagePayload, PhaseSignal,
    QoSProfile, Result,
};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::benchmark::{Benchmark, BenchmarkContext};

/// Value announced on the messages-saved topic.
pub const MESSAGES_SAVED: u32 = 1;

const LIFECYCLE_CHANNEL_CAPACITY: usize = 64;

/// Construction and teardown notifications for benchmark instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Constructed { id: Uuid, kind: BenchmarkKind },
    Destroyed { id: Uuid, kind: BenchmarkKind },
}

/// Result of handling one selection notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Same selector as last time; nothing changed.
    Ignored,
    Applied {
        destroyed: Option<BenchmarkKind>,
        constructed: Option<BenchmarkKind>,
    },
}

/// Snapshot of the controller published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub selector: BenchmarkSelector,
    pub active: Option<ActiveBenchmark>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveBenchmark {
    pub id: Uuid,
    pub kind: BenchmarkKind,
    pub created_at: DateTime<Utc>,
}

/// Owns the selector and the single benchmark slot.
///
/// Selection and phase notifications must be fed from one task; the
/// controller itself holds no locks.
#[derive(Debug)]
pub struct RobotController {
    context: BenchmarkContext,
    topics: TopicConfig,
    selector: BenchmarkSelector,
    slot: Option<Benchmark>,
    events: broadcast::Sender<LifecycleEvent>,
    status: watch::Sender<ControllerStatus>,
}

impl RobotController {
    /// Create the controller and announce `messages_saved` on a retained
    /// topic.
    pub fn new(bus: &MessageBus, topics: &TopicConfig, context: BenchmarkContext) -> Result<Self> {
        bus.advertise(&topics.messages_saved, QoSProfile::retained());
        bus.publish(
            &topics.messages_saved,
            MessagePayload::MessagesSaved(MESSAGES_SAVED),
        )?;
        rsbb_debug!(
            context = LogContext::new().with_robot(&context.robot),
            "announced messages_saved={} on {}",
            MESSAGES_SAVED,
            topics.messages_saved
        );

        let (events, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);
        let (status, _) = watch::channel(ControllerStatus {
            selector: BenchmarkSelector::None,
            active: None,
        });
        Ok(Self {
            context,
            topics: topics.clone(),
            selector: BenchmarkSelector::None,
            slot: None,
            events,
            status,
        })
    }

    pub fn selector(&self) -> BenchmarkSelector {
        self.selector
    }

    pub fn active(&self) -> Option<&Benchmark> {
        self.slot.as_ref()
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn lifecycle_sender(&self) -> broadcast::Sender<LifecycleEvent> {
        self.events.clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ControllerStatus> {
        self.status.subscribe()
    }

    /// Route an inbound bus message by topic. A payload that does not belong
    /// on its topic is dropped.
    pub async fn handle(&mut self, message: &Message) {
        match &message.payload {
            MessagePayload::Benchmark(selector) if message.topic == self.topics.benchmark => {
                self.on_selection(*selector).await;
            }
            MessagePayload::BenchmarkState(signal)
                if message.topic == self.topics.benchmark_state =>
            {
                self.on_phase(*signal);
            }
            _ => {
                rsbb_warn!(
                    context = LogContext::new().with_robot(&self.context.robot),
                    "dropping {} payload received on {}",
                    message.kind(),
                    message.topic
                );
            }
        }
    }

    /// Apply a selection: ignore repeats, otherwise destroy the current
    /// instance before building the new one.
    pub async fn on_selection(&mut self, selector: BenchmarkSelector) -> SelectionOutcome {
        if selector == self.selector {
            rsbb_debug!(
                context = LogContext::new()
                    .with_robot(&self.context.robot)
                    .with_benchmark(selector.as_ref()),
                "selection unchanged"
            );
            return SelectionOutcome::Ignored;
        }
        self.selector = selector;

        let destroyed = match self.slot.take() {
            Some(benchmark) => {
                let (id, kind) = (benchmark.id(), benchmark.kind());
                benchmark.destroy().await;
                log_lifecycle_event(
                    Some(
                        &LogContext::new()
                            .with_robot(&self.context.robot)
                            .with_benchmark(kind.as_ref()),
                    ),
                    "benchmark.destroyed",
                    "benchmark instance destroyed",
                    LifecycleOutcome::Success,
                );
                let _ = self.events.send(LifecycleEvent::Destroyed { id, kind });
                Some(kind)
            }
            None => None,
        };

        let constructed = selector.kind().map(|kind| {
            let benchmark = Benchmark::spawn(kind, self.context.clone());
            log_lifecycle_event(
                Some(
                    &LogContext::new()
                        .with_robot(&self.context.robot)
                        .with_benchmark(kind.as_ref()),
                ),
                "benchmark.constructed",
                "benchmark instance constructed",
                LifecycleOutcome::Success,
            );
            let _ = self.events.send(LifecycleEvent::Constructed {
                id: benchmark.id(),
                kind,
            });
            self.slot = Some(benchmark);
            kind
        });

        self.publish_status();
        SelectionOutcome::Applied {
            destroyed,
            constructed,
        }
    }

    /// Forward a phase signal to the active instance, if any. Returns
    /// whether an instance received it.
    pub fn on_phase(&mut self, signal: PhaseSignal) -> bool {
        if let Some(metrics) = &self.context.metrics {
            metrics.record_phase_signal(signal.as_ref());
        }
        match &self.slot {
            Some(benchmark) => benchmark.deliver(signal),
            None => {
                rsbb_debug!(
                    context = LogContext::new()
                        .with_robot(&self.context.robot)
                        .with_phase(signal.as_ref()),
                    "no active benchmark; phase ignored"
                );
                false
            }
        }
    }

    /// Tear down the active instance, if any.
    pub async fn shutdown(mut self) {
        if let Some(benchmark) = self.slot.take() {
            let (id, kind) = (benchmark.id(), benchmark.kind());
            benchmark.destroy().await;
            let _ = self.events.send(LifecycleEvent::Destroyed { id, kind });
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let active = self.slot.as_ref().map(|benchmark| ActiveBenchmark {
            id: benchmark.id(),
            kind: benchmark.kind(),
            created_at: benchmark.created_at(),
        });
        self.status.send_replace(ControllerStatus {
            selector: self.selector,
            active,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use rsbb_msg::InProcessServices;

    fn controller(bus: &MessageBus) -> RobotController {
        let context = BenchmarkContext {
            robot: "dummy_roah_robot".into(),
            services: Arc::new(InProcessServices::new()),
            end_prepare: "/roah_rsbb/end_prepare".into(),
            end_execute: "/roah_rsbb/end_execute".into(),
            probe_timeout: Duration::from_millis(100),
            phase_delay: Duration::from_secs(3),
            metrics: None,
        };
        RobotController::new(bus, &TopicConfig::default(), context).expect("controller")
    }

    #[tokio::test]
    async fn construction_announces_messages_saved() {
        let bus = MessageBus::new();
        let _controller = controller(&bus);
        let latest = bus.latest("/roah_rsbb/messages_saved").expect("retained");
        assert_eq!(latest.payload, MessagePayload::MessagesSaved(1));
        assert_eq!(bus.metrics().published, 1);
    }

    #[tokio::test]
    async fn initial_none_is_ignored() {
        let bus = MessageBus::new();
        let mut controller = controller(&bus);
        assert_eq!(
            controller.on_selection(BenchmarkSelector::None).await,
            SelectionOutcome::Ignored
        );
        assert!(controller.active().is_none());
    }

    #[tokio::test]
    async fn reselection_keeps_instance_identity() {
        let bus = MessageBus::new();
        let mut controller = controller(&bus);
        controller.on_selection(BenchmarkSelector::Hopf).await;
        let first = controller.active().map(Benchmark::id).expect("instance");
        assert_eq!(
            controller.on_selection(BenchmarkSelector::Hopf).await,
            SelectionOutcome::Ignored
        );
        assert_eq!(controller.active().map(Benchmark::id), Some(first));
    }

    #[tokio::test]
    async fn switching_destroys_before_constructing() {
        let bus = MessageBus::new();
        let mut controller = controller(&bus);
        let mut events = controller.subscribe_lifecycle();
        controller.on_selection(BenchmarkSelector::Hopf).await;
        let outcome = controller.on_selection(BenchmarkSelector::Hwv).await;
        assert_eq!(
            outcome,
            SelectionOutcome::Applied {
                destroyed: Some(BenchmarkKind::Hopf),
                constructed: Some(BenchmarkKind::Hwv),
            }
        );

        let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert!(matches!(
            kinds.as_slice(),
            [
                LifecycleEvent::Constructed { kind: BenchmarkKind::Hopf, .. },
                LifecycleEvent::Destroyed { kind: BenchmarkKind::Hopf, .. },
                LifecycleEvent::Constructed { kind: BenchmarkKind::Hwv, .. },
            ]
        ));
    }

    #[tokio::test]
    async fn payloads_on_the_wrong_topic_are_dropped() {
        let bus = MessageBus::new();
        let mut controller = controller(&bus);
        let topics = TopicConfig::default();

        controller
            .handle(&Message::new(
                &topics.benchmark_state,
                MessagePayload::Benchmark(BenchmarkSelector::Hopf),
            ))
            .await;
        controller
            .handle(&Message::new(
                &topics.messages_saved,
                MessagePayload::Benchmark(BenchmarkSelector::Hwv),
            ))
            .await;
        assert_eq!(controller.selector(), BenchmarkSelector::None);
        assert!(controller.active().is_none());

        controller
            .handle(&Message::new(
                &topics.benchmark,
                MessagePayload::Benchmark(BenchmarkSelector::Hopf),
            ))
            .await;
        let state = controller.active().expect("instance").watch_state();
        controller
            .handle(&Message::new(
                &topics.benchmark,
                MessagePayload::BenchmarkState(PhaseSignal::Prepare),
            ))
            .await;
        tokio::task::yield_now().await;
        assert!(!state.has_changed().expect("worker alive"));
        assert_eq!(
            controller.active().map(Benchmark::kind),
            Some(BenchmarkKind::Hopf)
        );
    }

    #[tokio::test]
    async fn none_clears_slot_and_phase_is_dropped() {
        let bus = MessageBus::new();
        let mut controller = controller(&bus);
        let status = controller.watch_status();
        controller.on_selection(BenchmarkSelector::Hnf).await;
        assert_eq!(
            status.borrow().active.as_ref().map(|a| a.kind),
            Some(BenchmarkKind::Hnf)
        );

        controller.on_selection(BenchmarkSelector::None).await;
        assert!(controller.active().is_none());
        assert!(status.borrow().active.is_none());
        assert!(!controller.on_phase(PhaseSignal::Prepare));
    }
}
