//! ---
//! rsbb_section: "05-networking-external-interfaces"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "HTTP bridge onto the in-process message bus."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rsbb_common::config::TopicConfig;
use rsbb_common::version::VersionInfo;
use rsbb_core::ControllerStatus;
use rsbb_msg::{Message, MessageBus, MessagePayload, MessagingError};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{absolute_name, serve, HttpServer};

/// Shared state exposed to bridge handlers.
pub struct BridgeState {
    robot: String,
    bus: MessageBus,
    topics: TopicConfig,
    status: Option<watch::Receiver<ControllerStatus>>,
    version: VersionInfo,
    start: Instant,
}

impl BridgeState {
    pub fn new(robot: impl Into<String>, bus: MessageBus) -> Self {
        Self {
            robot: robot.into(),
            bus,
            topics: TopicConfig::default(),
            status: None,
            version: VersionInfo::current(),
            start: Instant::now(),
        }
    }

    /// Topic names the robot listens on; only these accept publishes.
    pub fn with_topics(mut self, topics: TopicConfig) -> Self {
        self.topics = topics;
        self
    }

    /// Report the controller's state on `/healthz`.
    pub fn with_status(mut self, status: watch::Receiver<ControllerStatus>) -> Self {
        self.status = Some(status);
        self
    }

    fn check_publish(&self, topic: &str, payload: &MessagePayload) -> Result<(), BridgeError> {
        if topic != self.topics.benchmark && topic != self.topics.benchmark_state {
            return Err(BridgeError::new(
                StatusCode::FORBIDDEN,
                format!("{topic} is not an inbound topic"),
            ));
        }
        let fits = match payload {
            MessagePayload::Benchmark(_) => topic == self.topics.benchmark,
            MessagePayload::BenchmarkState(_) => topic == self.topics.benchmark_state,
            MessagePayload::MessagesSaved(_) => false,
        };
        if !fits {
            return Err(BridgeError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("payload does not belong on {topic}"),
            ));
        }
        Ok(())
    }

    fn health(&self) -> HealthResponse {
        HealthResponse {
            status: if self.bus.is_closed() { "closing" } else { "ok" },
            robot: self.robot.clone(),
            version: self.version.cli_string(),
            git_commit: self.version.git_sha.clone(),
            uptime_seconds: self.start.elapsed().as_secs(),
            controller: self.status.as_ref().map(|rx| rx.borrow().clone()),
        }
    }
}

impl fmt::Debug for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeState")
            .field("robot", &self.robot)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Serve the topic bridge on `addr`.
pub fn spawn_bridge(state: Arc<BridgeState>, addr: SocketAddr) -> Result<HttpServer> {
    let router = Router::new()
        .route("/healthz", get(get_health))
        .route("/topics", get(list_topics))
        .route("/topics/*topic", get(get_topic).post(post_topic))
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    serve(router, addr, "bridge")
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    robot: String,
    version: String,
    git_commit: String,
    uptime_seconds: u64,
    controller: Option<ControllerStatus>,
}

#[derive(Debug, Serialize)]
struct PublishAck {
    topic: String,
    sequence: u64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
struct BridgeError {
    status: StatusCode,
    message: String,
}

impl BridgeError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<MessagingError> for BridgeError {
    fn from(err: MessagingError) -> Self {
        let status = match err {
            MessagingError::BusClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn get_health(State(state): State<Arc<BridgeState>>) -> Json<HealthResponse> {
    Json(state.health())
}

async fn list_topics(State(state): State<Arc<BridgeState>>) -> Json<Vec<String>> {
    Json(state.bus.topics())
}

async fn get_topic(
    State(state): State<Arc<BridgeState>>,
    Path(topic): Path<String>,
) -> Result<Json<Message>, BridgeError> {
    let topic = absolute_name(&topic);
    state.bus.latest(&topic).map(Json).ok_or_else(|| {
        BridgeError::new(
            StatusCode::NOT_FOUND,
            format!("no retained message on {topic}"),
        )
    })
}

async fn post_topic(
    State(state): State<Arc<BridgeState>>,
    Path(topic): Path<String>,
    Json(payload): Json<MessagePayload>,
) -> Result<(StatusCode, Json<PublishAck>), BridgeError> {
    let topic = absolute_name(&topic);
    state.check_publish(&topic, &payload)?;
    let sequence = state.bus.publish(&topic, payload)?;
    info!(topic = %topic, sequence, "bridged message published");
    Ok((StatusCode::ACCEPTED, Json(PublishAck { topic, sequence })))
}
