//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "binary"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Binary entrypoint for the dummy robot daemon."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use rsbb_common::config::AppConfig;
use rsbb_common::logging::{init_tracing, LogFormat};
use rsbb_common::version::VersionInfo;
use rsbb_core::RobotRuntime;
use rsbb_metrics::{new_registry, spawn_http_server, DaemonMetrics, RobotMetrics, SharedRegistry};
use rsbb_msg::{MessageBus, MessagingMetricsExporter, ServiceClient};
use rsbb_net::{spawn_bridge, BridgeState, HttpServer, HttpServiceClient, RefereeStub};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "RSBB dummy robot daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Override the stdout log format")]
    log_format: Option<CliLogFormat>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Json,
    Pretty,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Json => LogFormat::StructuredJson,
            CliLogFormat::Pretty => LogFormat::Pretty,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended());
        return Ok(());
    }
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/rsbb-dummyd.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_or_default(&candidates)?;
    let mut config = loaded.config;
    let load_duration = load_started.elapsed();

    let metrics_registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(metrics_registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.inc_start();
    daemon_metrics.set_build_info(&version.semver, &version.git_sha, &version.profile);

    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    init_tracing("rsbb-dummyd", &config.logging)?;

    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; running with defaults"),
    }

    run_daemon(config, metrics_registry, version).await
}

async fn run_daemon(
    config: AppConfig,
    metrics_registry: SharedRegistry,
    version: VersionInfo,
) -> Result<()> {
    let metrics_settings = config.metrics.clone();
    let bridge_settings = config.bridge.clone();

    let (registry, metrics_server) = if metrics_settings.enabled {
        info!(address = %metrics_settings.listen, "metrics exporter enabled");
        let server = spawn_http_server(metrics_registry.clone(), metrics_settings.listen)?;
        (Some(metrics_registry), Some(server))
    } else {
        info!("metrics exporter disabled by configuration");
        (None, None)
    };

    let bus = match &registry {
        Some(registry) => MessageBus::with_exporter(
            MessagingMetricsExporter::register(registry)
                .context("failed to register bus metrics")?,
        ),
        None => MessageBus::new(),
    };
    let robot_metrics = registry.map(RobotMetrics::new).transpose()?;

    let services: Arc<dyn ServiceClient> = match &config.services.referee_url {
        Some(url) => {
            info!(referee = %url, "reporting phase completion over http");
            Arc::new(HttpServiceClient::new(url)?)
        }
        None => {
            warn!("no referee_url configured; phase completions go to the built-in referee stub");
            Arc::new(RefereeStub::accepting(&config.services).services().clone())
        }
    };

    let robot = config.robot.name.clone();
    let topics = config.topics.clone();
    let handle = RobotRuntime::new(config, bus.clone(), services, robot_metrics).start()?;

    let mut bridge: Option<HttpServer> = None;
    if bridge_settings.enabled {
        let state = BridgeState::new(robot.clone(), bus.clone())
            .with_topics(topics)
            .with_status(handle.watch_status());
        match spawn_bridge(Arc::new(state), bridge_settings.listen) {
            Ok(server) => {
                info!(address = %server.addr(), "topic bridge listening");
                bridge = Some(server);
            }
            Err(err) => {
                warn!(error = %err, "failed to start topic bridge");
            }
        }
    } else {
        info!("topic bridge disabled by configuration");
    }

    info!(robot = %robot, version = %version.cli_string(), "daemon running; waiting for termination signal");
    wait_for_termination().await?;
    info!("termination signal received; shutting down");

    if let Some(server) = bridge {
        server.shutdown().await?;
    }
    handle.shutdown().await?;
    bus.close();

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination() -> Result<()> {
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = signal::ctrl_c() => result.context("failed to listen for ctrl-c")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination() -> Result<()> {
    signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")
}
