//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Shared primitives and utilities for the robot runtime."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
//! Shared primitives for the RSBB dummy robot workspace.
//! This crate exposes configuration loading, tracing setup, and version
//! metadata consumed by the daemon, the control CLI, and the runtime crates.

pub mod config;
pub mod logging;
pub mod version;

pub use config::{
    AppConfig, BridgeConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, RobotConfig,
    ServiceConfig, TimingConfig, TopicConfig,
};
pub use logging::{init_console, init_tracing, LogFormat};
pub use version::VersionInfo;
