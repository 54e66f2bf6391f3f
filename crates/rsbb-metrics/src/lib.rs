//! ---
//! rsbb_section: "03-logging"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Metrics collection and export utilities."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder, TEXT_FORMAT,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Serve `registry` in the Prometheus text format at `/metrics`.
///
/// The returned handle reports the bound address, so `addr` may use port 0.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new()
        .route("/metrics", get(scrape))
        .with_state(registry);

    let listener = StdTcpListener::bind(addr)
        .and_then(|listener| listener.set_nonblocking(true).map(|()| listener))
        .with_context(|| format!("failed to bind metrics listener {addr}"))?;
    let bound = listener.local_addr().context("metrics listener has no address")?;
    let listener = TcpListener::from_std(listener).context("failed to adopt metrics listener")?;

    info!(address = %bound, "metrics exporter listening");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics exporter stopped with an error")
    });

    Ok(MetricsServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task,
    })
}

async fn scrape(State(registry): State<SharedRegistry>) -> Response {
    match TextEncoder::new().encode_to_string(&registry.gather()) {
        Ok(body) => (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(TEXT_FORMAT),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error").into_response()
        }
    }
}

/// Running `/metrics` exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting scrapes and wait for in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.context("metrics exporter task panicked")?
    }
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    registry: SharedRegistry,
    starts_total: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "rsbb_dummyd_starts_total",
            "Total number of times the dummy robot daemon has initialised",
        ))?;
        registry.register(Box::new(starts_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 12)
            .context("failed to construct histogram buckets")?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "rsbb_dummyd_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(config_load_seconds.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new(
                "rsbb_dummyd_build_info",
                "Build metadata for the running daemon binary",
            ),
            &["version", "git_sha", "profile"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            registry,
            starts_total,
            config_load_seconds,
            build_info,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }

    pub fn set_build_info(&self, version: &str, git_sha: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, git_sha, profile])
            .set(1.0);
    }
}

/// Benchmark lifecycle metrics recorded by the robot runtime.
#[derive(Clone, Debug)]
pub struct RobotMetrics {
    registry: SharedRegistry,
    created: IntCounterVec,
    destroyed: IntCounterVec,
    active: IntGauge,
    phase_signals: IntCounterVec,
    completions: IntCounterVec,
    failures: IntCounterVec,
}

impl RobotMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let created = IntCounterVec::new(
            Opts::new(
                "rsbb_benchmarks_created_total",
                "Benchmark instances constructed, by benchmark kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(created.clone()))?;

        let destroyed = IntCounterVec::new(
            Opts::new(
                "rsbb_benchmarks_destroyed_total",
                "Benchmark instances torn down, by benchmark kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(destroyed.clone()))?;

        let active = IntGauge::with_opts(Opts::new(
            "rsbb_active_benchmark",
            "Indicator (0/1) whether a benchmark instance is alive",
        ))?;
        registry.register(Box::new(active.clone()))?;

        let phase_signals = IntCounterVec::new(
            Opts::new(
                "rsbb_phase_signals_total",
                "Phase notifications received, by phase",
            ),
            &["phase"],
        )?;
        registry.register(Box::new(phase_signals.clone()))?;

        let completions = IntCounterVec::new(
            Opts::new(
                "rsbb_phase_completions_total",
                "Successful phase-completion service calls, by service",
            ),
            &["service"],
        )?;
        registry.register(Box::new(completions.clone()))?;

        let failures = IntCounterVec::new(
            Opts::new(
                "rsbb_service_failures_total",
                "Failed phase-completion service calls, by service and reason",
            ),
            &["service", "reason"],
        )?;
        registry.register(Box::new(failures.clone()))?;

        Ok(Self {
            registry,
            created,
            destroyed,
            active,
            phase_signals,
            completions,
            failures,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_created(&self, kind: &str) {
        self.created.with_label_values(&[kind]).inc();
        self.active.set(1);
    }

    pub fn record_destroyed(&self, kind: &str) {
        self.destroyed.with_label_values(&[kind]).inc();
        self.active.set(0);
    }

    pub fn record_phase_signal(&self, phase: &str) {
        self.phase_signals.with_label_values(&[phase]).inc();
    }

    pub fn record_completion(&self, service: &str) {
        self.completions.with_label_values(&[service]).inc();
    }

    pub fn record_failure(&self, service: &str, reason: &str) {
        self.failures.with_label_values(&[service, reason]).inc();
    }

    pub fn created_count(&self, kind: &str) -> u64 {
        self.created.with_label_values(&[kind]).get()
    }

    pub fn destroyed_count(&self, kind: &str) -> u64 {
        self.destroyed.with_label_values(&[kind]).get()
    }

    pub fn failure_count(&self, service: &str, reason: &str) -> u64 {
        self.failures.with_label_values(&[service, reason]).get()
    }

    pub fn is_active(&self) -> bool {
        self.active.get() == 1
    }
}

pub use prometheus;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_metrics_track_lifecycle() {
        let metrics = RobotMetrics::new(new_registry()).expect("register");
        metrics.record_created("HOPF");
        assert!(metrics.is_active());
        metrics.record_destroyed("HOPF");
        assert!(!metrics.is_active());
        metrics.record_failure("/roah_rsbb/end_prepare", "unavailable");
        assert_eq!(metrics.created_count("HOPF"), 1);
        assert_eq!(
            metrics.failure_count("/roah_rsbb/end_prepare", "unavailable"),
            1
        );
    }

    #[test]
    fn registries_reject_duplicate_robot_metrics() {
        let registry = new_registry();
        RobotMetrics::new(registry.clone()).expect("first");
        assert!(RobotMetrics::new(registry).is_err());
    }

    #[tokio::test]
    async fn http_server_serves_metrics() {
        let registry = new_registry();
        let daemon = DaemonMetrics::new(registry.clone()).expect("register");
        daemon.inc_start();
        daemon.set_build_info("0.1.0", "unknown", "debug");

        let server =
            spawn_http_server(registry, "127.0.0.1:0".parse().expect("addr")).expect("spawn");
        let body = reqwest::get(format!("http://{}/metrics", server.addr()))
            .await
            .expect("scrape")
            .text()
            .await
            .expect("body");
        assert!(body.contains("rsbb_dummyd_starts_total 1"));
        server.shutdown().await.expect("shutdown");
    }
}
