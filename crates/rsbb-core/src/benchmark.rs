//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Benchmark stub state machine and phase worker."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rsbb_common::config::AppConfig;
use rsbb_logging::{
    log_lifecycle_event, rsbb_debug, rsbb_error, rsbb_info, LifecycleOutcome, LogContext,
};
use rsbb_metrics::RobotMetrics;
use rsbb_msg::{
    call_with_probe, BenchmarkKind, PhaseSignal, Pose2D, ResultPayload, ServiceClient,
    ServiceRequest,
};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Builds the result attached to the `end_execute` call.
pub type ExecuteOverride = fn() -> ResultPayload;

/// Lifecycle position of a benchmark instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BenchmarkState {
    Idle,
    Preparing,
    Executing,
}

/// Everything a benchmark needs to report phase completion.
#[derive(Clone)]
pub struct BenchmarkContext {
    pub robot: String,
    pub services: Arc<dyn ServiceClient>,
    pub end_prepare: String,
    pub end_execute: String,
    pub probe_timeout: Duration,
    pub phase_delay: Duration,
    pub metrics: Option<RobotMetrics>,
}

impl fmt::Debug for BenchmarkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkContext")
            .field("robot", &self.robot)
            .field("services", &self.services.name())
            .field("end_prepare", &self.end_prepare)
            .field("end_execute", &self.end_execute)
            .field("probe_timeout", &self.probe_timeout)
            .field("phase_delay", &self.phase_delay)
            .finish_non_exhaustive()
    }
}

impl BenchmarkContext {
    pub fn from_config(
        config: &AppConfig,
        services: Arc<dyn ServiceClient>,
        metrics: Option<RobotMetrics>,
    ) -> Self {
        Self {
            robot: config.robot.name.clone(),
            services,
            end_prepare: config.services.end_prepare.clone(),
            end_execute: config.services.end_execute.clone(),
            probe_timeout: config.services.probe_timeout,
            phase_delay: config.timing.phase_delay,
            metrics,
        }
    }
}

/// Fixed perception result reported by the HOPF stub.
pub fn hopf_result() -> ResultPayload {
    ResultPayload {
        object_class: "cups".to_owned(),
        object_name: "red_cup".to_owned(),
        object_pose: Pose2D {
            x: 0.1,
            y: 0.2,
            theta: 1.23,
        },
    }
}

/// Execute-phase override for a variant. Only HOPF deviates from the base
/// behaviour.
pub fn execute_override(kind: BenchmarkKind) -> Option<ExecuteOverride> {
    match kind {
        BenchmarkKind::Hopf => Some(hopf_result),
        BenchmarkKind::Hgtkmh
        | BenchmarkKind::Hwv
        | BenchmarkKind::Hcfgac
        | BenchmarkKind::Hnf
        | BenchmarkKind::Hsuf => None,
    }
}

/// A live benchmark stub. Phase work runs on its own worker task; dropping
/// the record without [`Benchmark::destroy`] aborts the worker as well and
/// still counts the instance as destroyed.
pub struct Benchmark {
    id: Uuid,
    kind: BenchmarkKind,
    created_at: DateTime<Utc>,
    signals: mpsc::UnboundedSender<PhaseSignal>,
    state: watch::Receiver<BenchmarkState>,
    worker: Option<JoinHandle<()>>,
    metrics: Option<RobotMetrics>,
}

impl fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Benchmark")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("created_at", &self.created_at)
            .field("state", &self.state())
            .finish()
    }
}

impl Benchmark {
    /// Construct a benchmark of `kind` and start its worker.
    pub fn spawn(kind: BenchmarkKind, context: BenchmarkContext) -> Self {
        let id = Uuid::new_v4();
        let (signals, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(BenchmarkState::Idle);
        let metrics = context.metrics.clone();
        let worker = tokio::spawn(run_worker(
            kind,
            execute_override(kind),
            context,
            receiver,
            state_tx,
        ));
        if let Some(metrics) = &metrics {
            metrics.record_created(kind.as_ref());
        }
        Self {
            id,
            kind,
            created_at: Utc::now(),
            signals,
            state,
            worker: Some(worker),
            metrics,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> BenchmarkKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> BenchmarkState {
        *self.state.borrow()
    }

    /// Watch channel following the worker's state transitions.
    pub fn watch_state(&self) -> watch::Receiver<BenchmarkState> {
        self.state.clone()
    }

    /// Queue a phase signal. Signals are handled strictly in order.
    pub fn deliver(&self, signal: PhaseSignal) -> bool {
        self.signals.send(signal).is_ok()
    }

    /// Cancel any in-flight phase work and wait for the worker to finish.
    pub async fn destroy(mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
            match worker.await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => log_lifecycle_event(
                    Some(&LogContext::new().with_benchmark(self.kind.as_ref())),
                    "benchmark.worker_failed",
                    &format!("benchmark worker failed: {err}"),
                    LifecycleOutcome::Fault,
                ),
            }
        }
        self.release();
    }

    // Counts the instance as destroyed exactly once.
    fn release(&mut self) {
        if let Some(metrics) = self.metrics.take() {
            metrics.record_destroyed(self.kind.as_ref());
        }
    }
}

impl Drop for Benchmark {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.release();
    }
}

async fn run_worker(
    kind: BenchmarkKind,
    execute_result: Option<ExecuteOverride>,
    context: BenchmarkContext,
    mut signals: mpsc::UnboundedReceiver<PhaseSignal>,
    state: watch::Sender<BenchmarkState>,
) {
    while let Some(signal) = signals.recv().await {
        let log = LogContext::new()
            .with_robot(&context.robot)
            .with_benchmark(kind.as_ref())
            .with_phase(signal.as_ref());
        match signal {
            PhaseSignal::Stop => {
                rsbb_debug!(context = log, "stop received; nothing to do");
            }
            PhaseSignal::Prepare => {
                state.send_replace(BenchmarkState::Preparing);
                rsbb_info!(context = log, "preparing");
                tokio::time::sleep(context.phase_delay).await;
                complete_phase(&context, &log, &context.end_prepare, ServiceRequest::Empty).await;
            }
            PhaseSignal::Execute => {
                state.send_replace(BenchmarkState::Executing);
                rsbb_info!(context = log, "executing");
                tokio::time::sleep(context.phase_delay).await;
                let request = match execute_result {
                    Some(build) => ServiceRequest::WithResult(build()),
                    None => ServiceRequest::Empty,
                };
                complete_phase(&context, &log, &context.end_execute, request).await;
            }
        }
    }
}

async fn complete_phase(
    context: &BenchmarkContext,
    log: &LogContext<'_>,
    service: &str,
    request: ServiceRequest,
) {
    match call_with_probe(
        context.services.as_ref(),
        service,
        request,
        context.probe_timeout,
    )
    .await
    {
        Ok(()) => {
            rsbb_info!(context = log, "called service {}", service);
            if let Some(metrics) = &context.metrics {
                metrics.record_completion(service);
            }
        }
        Err(err) => {
            rsbb_error!(context = log, "{}", err);
            if let Some(metrics) = &context.metrics {
                metrics.record_failure(service, err.reason_label());
            }
        }
    }
}
