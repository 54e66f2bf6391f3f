//! ---
//! rsbb_section: "05-networking-external-interfaces"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Referee box stub serving phase-completion services."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rsbb_common::config::ServiceConfig;
use rsbb_msg::{InProcessServices, MessagingError, ServiceRequest};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{absolute_name, serve, HttpServer};

/// Referee side of the phase-completion services.
#[derive(Debug, Clone, Default)]
pub struct RefereeStub {
    services: InProcessServices,
}

impl RefereeStub {
    pub fn new(services: InProcessServices) -> Self {
        Self { services }
    }

    /// Stub accepting `end_prepare` and `end_execute` and logging each call.
    pub fn accepting(config: &ServiceConfig) -> Self {
        let services = InProcessServices::new();
        for name in [&config.end_prepare, &config.end_execute] {
            let service = name.clone();
            services.advertise(name.clone(), move |request| {
                match request.result() {
                    Some(result) => info!(
                        service = %service,
                        object_class = %result.object_class,
                        object_name = %result.object_name,
                        x = result.object_pose.x,
                        y = result.object_pose.y,
                        theta = result.object_pose.theta,
                        "phase completed with result"
                    ),
                    None => info!(service = %service, "phase completed"),
                }
                Ok(())
            });
        }
        Self { services }
    }

    pub fn services(&self) -> &InProcessServices {
        &self.services
    }
}

/// Serve `stub` on `addr`.
pub fn spawn_referee(stub: RefereeStub, addr: SocketAddr) -> Result<HttpServer> {
    let router = Router::new()
        .route("/services", get(list_services))
        .route("/services/*name", get(probe_service).post(call_service))
        .route("/calls", get(list_calls))
        .with_state(Arc::new(stub))
        .layer(TraceLayer::new_for_http());
    serve(router, addr, "referee")
}

#[derive(Debug, Serialize)]
struct CallAck {
    service: String,
    accepted: bool,
}

#[derive(Debug, Serialize)]
struct CallRecord {
    service: String,
    request: ServiceRequest,
    accepted: bool,
    at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
struct RefereeError {
    status: StatusCode,
    message: String,
}

impl From<MessagingError> for RefereeError {
    fn from(err: MessagingError) -> Self {
        let status = match err {
            MessagingError::ServiceUnavailable { .. } => StatusCode::NOT_FOUND,
            MessagingError::ServiceCallFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for RefereeError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn list_services(State(stub): State<Arc<RefereeStub>>) -> Json<Vec<String>> {
    Json(stub.services.services())
}

async fn probe_service(
    State(stub): State<Arc<RefereeStub>>,
    Path(name): Path<String>,
) -> StatusCode {
    if stub.services.is_available(&absolute_name(&name)) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn call_service(
    State(stub): State<Arc<RefereeStub>>,
    Path(name): Path<String>,
    Json(request): Json<ServiceRequest>,
) -> Result<Json<CallAck>, RefereeError> {
    let service = absolute_name(&name);
    stub.services.invoke(&service, request)?;
    Ok(Json(CallAck {
        service,
        accepted: true,
    }))
}

async fn list_calls(State(stub): State<Arc<RefereeStub>>) -> Json<Vec<CallRecord>> {
    let calls = stub
        .services
        .calls()
        .into_iter()
        .map(|call| CallRecord {
            service: call.service,
            request: call.request,
            accepted: call.accepted,
            at: call.at,
        })
        .collect();
    Json(calls)
}
