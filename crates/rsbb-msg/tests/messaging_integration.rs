//! ---
//! rsbb_section: "02-messaging-ipc-data-model"
//! rsbb_subsection: "tests"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Bus and service behaviour across module boundaries."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::time::Duration;

use prometheus::Registry;
use rsbb_msg::{
    call_with_probe, BenchmarkSelector, InProcessServices, MessageBus, MessagePayload,
    MessagingMetricsExporter, PhaseSignal, QoSProfile, ServiceRequest,
};

#[tokio::test]
async fn exporter_tracks_bus_activity() {
    let registry = Registry::new();
    let exporter = MessagingMetricsExporter::register(&registry).expect("register");
    let bus = MessageBus::with_exporter(exporter);
    let mut sub = bus.subscribe(&["/state"], 1);

    bus.publish("/state", MessagePayload::BenchmarkState(PhaseSignal::Prepare))
        .expect("publish");
    bus.publish("/state", MessagePayload::BenchmarkState(PhaseSignal::Execute))
        .expect("publish");
    sub.recv().await.expect("delivered");

    let value = |name: &str| {
        registry
            .gather()
            .iter()
            .find(|family| family.get_name() == name)
            .map(|family| family.get_metric()[0].get_counter().get_value())
            .unwrap_or_default()
    };
    assert_eq!(value("rsbb_messages_published_total"), 2.0);
    assert_eq!(value("rsbb_messages_delivered_total"), 1.0);
    assert_eq!(value("rsbb_messages_overwritten_total"), 1.0);
}

#[tokio::test]
async fn two_subscribers_get_independent_queues() {
    let bus = MessageBus::new();
    let mut fast = bus.subscribe(&["/benchmark"], 1);
    let mut slow = bus.subscribe(&["/benchmark"], 2);

    bus.publish("/benchmark", MessagePayload::Benchmark(BenchmarkSelector::Hopf))
        .expect("publish");
    let first = fast.recv().await.expect("fast first");
    bus.publish("/benchmark", MessagePayload::Benchmark(BenchmarkSelector::Hwv))
        .expect("publish");

    assert_eq!(first.payload, MessagePayload::Benchmark(BenchmarkSelector::Hopf));
    assert_eq!(fast.recv().await.map(|m| m.sequence), Some(2));
    assert_eq!(slow.recv().await.map(|m| m.sequence), Some(1));
    assert_eq!(slow.recv().await.map(|m| m.sequence), Some(2));
    assert_eq!(fast.overwritten() + slow.overwritten(), 0);
}

#[tokio::test]
async fn readvertising_as_volatile_clears_retained_value() {
    let bus = MessageBus::new();
    bus.advertise("/saved", QoSProfile::retained());
    bus.publish("/saved", MessagePayload::MessagesSaved(1)).expect("publish");
    assert!(bus.latest("/saved").is_some());
    bus.advertise("/saved", QoSProfile::volatile());
    assert!(bus.latest("/saved").is_none());
}

#[tokio::test(start_paused = true)]
async fn services_round_trip_through_probe() {
    let services = InProcessServices::new();
    services.advertise_accepting("/roah_rsbb/end_execute");
    call_with_probe(
        &services,
        "/roah_rsbb/end_execute",
        ServiceRequest::Empty,
        Duration::from_millis(100),
    )
    .await
    .expect("call succeeds");
    assert_eq!(
        services.requests_to("/roah_rsbb/end_execute"),
        vec![ServiceRequest::Empty]
    );
}
