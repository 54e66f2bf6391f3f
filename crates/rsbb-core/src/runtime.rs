//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Dispatch loop wiring the bus to the robot controller."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use rsbb_common::config::AppConfig;
use rsbb_common::version::VersionInfo;
use rsbb_metrics::RobotMetrics;
use rsbb_msg::{MessageBus, ServiceClient, Subscription};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::benchmark::BenchmarkContext;
use crate::controller::{ControllerStatus, LifecycleEvent, RobotController};

/// Builder for the robot's dispatch task.
pub struct RobotRuntime {
    config: Arc<AppConfig>,
    bus: MessageBus,
    services: Arc<dyn ServiceClient>,
    metrics: Option<RobotMetrics>,
}

impl RobotRuntime {
    pub fn new(
        config: AppConfig,
        bus: MessageBus,
        services: Arc<dyn ServiceClient>,
        metrics: Option<RobotMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            bus,
            services,
            metrics,
        }
    }

    /// Subscribe to the input topics, announce `messages_saved`, and start
    /// dispatching.
    pub fn start(self) -> Result<RuntimeHandle> {
        let topics = &self.config.topics;
        // Subscribe before announcing so nothing published after startup is
        // missed; the announcement still precedes all dispatching.
        let subscription = self.bus.subscribe(
            &[topics.benchmark.as_str(), topics.benchmark_state.as_str()],
            topics.queue_depth,
        );
        let context =
            BenchmarkContext::from_config(&self.config, self.services.clone(), self.metrics.clone());
        let controller = RobotController::new(&self.bus, topics, context)
            .context("failed to construct robot controller")?;

        let lifecycle = controller.lifecycle_sender();
        let status = controller.watch_status();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let robot = self.config.robot.name.clone();
        let task = tokio::spawn(dispatch(controller, subscription, shutdown_rx));

        info!(
            robot = %robot,
            services = self.services.name(),
            version = %VersionInfo::current().cli_string(),
            "robot runtime started"
        );

        Ok(RuntimeHandle {
            config: self.config,
            bus: self.bus,
            shutdown: shutdown_tx,
            lifecycle,
            status,
            task,
        })
    }
}

async fn dispatch(
    mut controller: RobotController,
    mut subscription: Subscription,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("dispatch shutdown signal received");
                break;
            }
            message = subscription.recv() => match message {
                Some(message) => controller.handle(&message).await,
                None => {
                    debug!("bus closed; dispatch loop exiting");
                    break;
                }
            },
        }
    }
    let dropped = subscription.overwritten();
    controller.shutdown().await;
    info!(dropped, "robot runtime stopped");
}

/// Handle to a running robot used by the daemon and tests.
#[derive(Debug)]
pub struct RuntimeHandle {
    config: Arc<AppConfig>,
    bus: MessageBus,
    shutdown: broadcast::Sender<()>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
    status: watch::Receiver<ControllerStatus>,
    task: JoinHandle<()>,
}

impl RuntimeHandle {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }

    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ControllerStatus> {
        self.status.clone()
    }

    /// Stop dispatching, destroy the active benchmark, and wait for the
    /// dispatch task.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        if let Err(err) = self.task.await {
            error!(error = %err, "dispatch task join error");
            return Err(anyhow::Error::new(err).context("dispatch task failed"));
        }
        Ok(())
    }
}
