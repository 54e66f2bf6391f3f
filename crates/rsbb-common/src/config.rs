//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Shared primitives and utilities for the robot runtime."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_robot_name() -> String {
    "dummy_roah_robot".to_owned()
}

fn default_benchmark_topic() -> String {
    "/roah_rsbb/benchmark".to_owned()
}

fn default_benchmark_state_topic() -> String {
    "/roah_rsbb/benchmark/state".to_owned()
}

fn default_messages_saved_topic() -> String {
    "/roah_rsbb/messages_saved".to_owned()
}

fn default_queue_depth() -> usize {
    1
}

fn default_end_prepare() -> String {
    "/roah_rsbb/end_prepare".to_owned()
}

fn default_end_execute() -> String {
    "/roah_rsbb/end_execute".to_owned()
}

fn default_probe_timeout() -> Duration {
    Duration::from_millis(100)
}

fn default_phase_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_bridge_enabled() -> bool {
    true
}

fn default_bridge_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7311))
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9311))
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the dummy robot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub topics: TopicConfig,
    #[serde(default)]
    pub services: ServiceConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] came from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "RSBB_CONFIG";

    /// Load configuration from the first existing candidate, respecting the
    /// `RSBB_CONFIG` override. Falls back to defaults when nothing exists.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!("no configuration file found; using built-in defaults");
        Ok(LoadedAppConfig {
            config: AppConfig::default(),
            source: None,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.robot.name.trim().is_empty() {
            return Err(anyhow!("robot.name must not be empty"));
        }
        self.topics.validate()?;
        self.services.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default = "default_robot_name")]
    pub name: String,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            name: default_robot_name(),
        }
    }
}

/// Topic names and subscriber queue depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    #[serde(default = "default_benchmark_topic")]
    pub benchmark: String,
    #[serde(default = "default_benchmark_state_topic")]
    pub benchmark_state: String,
    #[serde(default = "default_messages_saved_topic")]
    pub messages_saved: String,
    /// Messages kept per topic in the robot's inbound queue; newer ones
    /// overwrite the oldest.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            benchmark: default_benchmark_topic(),
            benchmark_state: default_benchmark_state_topic(),
            messages_saved: default_messages_saved_topic(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl TopicConfig {
    pub fn validate(&self) -> Result<()> {
        let names = [&self.benchmark, &self.benchmark_state, &self.messages_saved];
        let mut seen = HashSet::new();
        for name in names {
            if name.trim().is_empty() {
                return Err(anyhow!("topic names must not be empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(anyhow!("topic '{}' is configured more than once", name));
            }
        }
        if self.queue_depth == 0 {
            return Err(anyhow!("topics.queue_depth must be at least 1"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_end_prepare")]
    pub end_prepare: String,
    #[serde(default = "default_end_execute")]
    pub end_execute: String,
    #[serde(default = "default_probe_timeout", rename = "probe_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub probe_timeout: Duration,
    /// Base URL of the referee box. Without it the in-process registry is used.
    #[serde(default)]
    pub referee_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            end_prepare: default_end_prepare(),
            end_execute: default_end_execute(),
            probe_timeout: default_probe_timeout(),
            referee_url: None,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.end_prepare.trim().is_empty() || self.end_execute.trim().is_empty() {
            return Err(anyhow!("service names must not be empty"));
        }
        if self.probe_timeout.is_zero() {
            return Err(anyhow!("services.probe_timeout_ms must be greater than zero"));
        }
        if let Some(url) = &self.referee_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!("services.referee_url must be an http(s) URL, got '{}'", url));
            }
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Simulated work before a phase is reported complete.
    #[serde(default = "default_phase_delay", rename = "phase_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub phase_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            phase_delay: default_phase_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bridge_listen")]
    pub listen: SocketAddr,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_bridge_enabled(),
            listen: default_bridge_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
