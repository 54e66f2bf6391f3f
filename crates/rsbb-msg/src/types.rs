//! ---
//! rsbb_section: "02-messaging-ipc-data-model"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Message schema shared with the referee box."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Schema version broadcast alongside every message payload.
pub const SCHEMA_VERSION: u16 = 1;

/// Benchmark selected by the referee box. `None` means no benchmark is running.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BenchmarkSelector {
    /// No benchmark selected.
    #[default]
    None,
    /// Getting to know my home.
    Hgtkmh,
    /// Welcoming visitors.
    Hwv,
    /// Catering for granny Annie's comfort.
    Hcfgac,
    /// Object perception functionality.
    Hopf,
    /// Navigation functionality.
    Hnf,
    /// Speech understanding functionality.
    Hsuf,
}

impl BenchmarkSelector {
    /// Benchmark variant to instantiate, if any.
    pub fn kind(self) -> Option<BenchmarkKind> {
        match self {
            BenchmarkSelector::None => None,
            BenchmarkSelector::Hgtkmh => Some(BenchmarkKind::Hgtkmh),
            BenchmarkSelector::Hwv => Some(BenchmarkKind::Hwv),
            BenchmarkSelector::Hcfgac => Some(BenchmarkKind::Hcfgac),
            BenchmarkSelector::Hopf => Some(BenchmarkKind::Hopf),
            BenchmarkSelector::Hnf => Some(BenchmarkKind::Hnf),
            BenchmarkSelector::Hsuf => Some(BenchmarkKind::Hsuf),
        }
    }
}

/// The six concrete benchmark variants a robot can be asked to run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BenchmarkKind {
    /// Getting to know my home.
    Hgtkmh,
    /// Welcoming visitors.
    Hwv,
    /// Catering for granny Annie's comfort.
    Hcfgac,
    /// Object perception functionality.
    Hopf,
    /// Navigation functionality.
    Hnf,
    /// Speech understanding functionality.
    Hsuf,
}

impl From<BenchmarkKind> for BenchmarkSelector {
    fn from(kind: BenchmarkKind) -> Self {
        match kind {
            BenchmarkKind::Hgtkmh => BenchmarkSelector::Hgtkmh,
            BenchmarkKind::Hwv => BenchmarkSelector::Hwv,
            BenchmarkKind::Hcfgac => BenchmarkSelector::Hcfgac,
            BenchmarkKind::Hopf => BenchmarkSelector::Hopf,
            BenchmarkKind::Hnf => BenchmarkSelector::Hnf,
            BenchmarkKind::Hsuf => BenchmarkSelector::Hsuf,
        }
    }
}

/// Lifecycle command sent to the active benchmark.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PhaseSignal {
    /// Return to idle; the stub performs nothing.
    Stop,
    /// Prepare for the benchmark, then report `end_prepare`.
    Prepare,
    /// Execute the benchmark, then report `end_execute`.
    Execute,
}

/// Planar pose with orientation in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    /// X coordinate in metres.
    pub x: f64,
    /// Y coordinate in metres.
    pub y: f64,
    /// Rotation around Z in radians.
    pub theta: f64,
}

/// Object recognised during a perception benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Object class label.
    pub object_class: String,
    /// Object instance name.
    pub object_name: String,
    /// Pose of the object on the table plane.
    pub object_pose: Pose2D,
}

/// Request body for a phase-completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ServiceRequest {
    /// Zero-argument request.
    Empty,
    /// Completion carrying a benchmark result.
    WithResult(ResultPayload),
}

impl ServiceRequest {
    /// Attached result, if any.
    pub fn result(&self) -> Option<&ResultPayload> {
        match self {
            ServiceRequest::Empty => None,
            ServiceRequest::WithResult(payload) => Some(payload),
        }
    }
}

/// Payload carried on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MessagePayload {
    /// Benchmark selection from the referee box.
    Benchmark(BenchmarkSelector),
    /// Benchmark phase from the referee box.
    BenchmarkState(PhaseSignal),
    /// Number of messages the robot has recorded.
    MessagesSaved(u32),
}

/// Unified message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for deduplication and tracing.
    pub id: Uuid,
    /// Version of the schema used by the payload.
    pub schema_version: u16,
    /// Timestamp when the message was created.
    pub timestamp: DateTime<Utc>,
    /// Topic the message was published on.
    pub topic: String,
    /// Per-topic sequence number assigned by the bus; `0` before publishing.
    #[serde(default)]
    pub sequence: u64,
    /// Actual payload carried by the message.
    pub payload: MessagePayload,
}

impl Message {
    /// Construct a new message envelope around the provided payload.
    pub fn new(topic: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            schema_version: SCHEMA_VERSION,
            timestamp: Utc::now(),
            topic: topic.into(),
            sequence: 0,
            payload,
        }
    }

    /// Convenience accessor returning the payload kind as a static string.
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            MessagePayload::Benchmark(_) => "benchmark",
            MessagePayload::BenchmarkState(_) => "benchmark_state",
            MessagePayload::MessagesSaved(_) => "messages_saved",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn only_none_has_no_kind() {
        let without_kind: Vec<_> = BenchmarkSelector::iter()
            .filter(|selector| selector.kind().is_none())
            .collect();
        assert_eq!(without_kind, vec![BenchmarkSelector::None]);
        for kind in BenchmarkKind::iter() {
            assert_eq!(BenchmarkSelector::from(kind).kind(), Some(kind));
        }
    }

    #[test]
    fn labels_match_referee_spelling() {
        assert_eq!(BenchmarkKind::Hopf.to_string(), "HOPF");
        assert_eq!(BenchmarkSelector::Hcfgac.as_ref(), "HCFGAC");
        assert_eq!("hwv".parse::<BenchmarkSelector>(), Ok(BenchmarkSelector::Hwv));
        assert_eq!("execute".parse::<PhaseSignal>(), Ok(PhaseSignal::Execute));
    }

    #[test]
    fn payload_json_shape_is_stable() {
        let payload = MessagePayload::Benchmark(BenchmarkSelector::Hopf);
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json, serde_json::json!({ "kind": "benchmark", "data": "HOPF" }));

        let phase: MessagePayload =
            serde_json::from_str(r#"{"kind":"benchmark_state","data":"PREPARE"}"#)
                .expect("deserialize");
        assert_eq!(phase, MessagePayload::BenchmarkState(PhaseSignal::Prepare));
    }

    #[test]
    fn empty_request_carries_no_result() {
        assert!(ServiceRequest::Empty.result().is_none());
        let json = serde_json::to_value(ServiceRequest::Empty).expect("serialize");
        assert_eq!(json, serde_json::json!({ "kind": "empty" }));
    }
}
