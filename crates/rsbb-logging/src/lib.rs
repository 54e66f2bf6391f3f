//! ---
//! rsbb_section: "03-logging"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Structured logging helpers and macros."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Logging helpers that attach robot/benchmark/phase context to every event.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Robot (node) name emitting the event.
    pub robot: Option<&'a str>,
    /// Active benchmark label, e.g. `HOPF`.
    pub benchmark: Option<&'a str>,
    /// Lifecycle phase being handled.
    pub phase: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the robot name.
    pub fn with_robot(mut self, robot: &'a str) -> Self {
        self.robot = Some(robot);
        self
    }

    /// Attach a benchmark label.
    pub fn with_benchmark(mut self, benchmark: &'a str) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    /// Attach a phase label.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// Outcome attached to lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The step completed.
    Success,
    /// The step failed; the robot carries on regardless.
    Fault,
}

impl LifecycleOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    match outcome {
        LifecycleOutcome::Success => tracing::event!(
            Level::INFO,
            event = %event,
            outcome = outcome.as_str(),
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %message
        ),
        LifecycleOutcome::Fault => tracing::event!(
            Level::ERROR,
            event = %event,
            outcome = outcome.as_str(),
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_robot("dummy_roah_robot")
            .with_benchmark("HOPF");
        rsbb_info!(context = ctx.clone(), "benchmark constructed");
        rsbb_debug!("debug message");
        rsbb_warn!(context = ctx.clone().with_phase("PREPARE"), "slow phase");
        rsbb_error!(context = ctx, "service failure: {}", "/roah_rsbb/end_prepare");
    }

    #[test]
    fn lifecycle_helper_emits_both_outcomes() {
        init();
        let ctx = LogContext::new().with_benchmark("HWV");
        log_lifecycle_event(
            Some(&ctx),
            "benchmark.created",
            "benchmark instance created",
            LifecycleOutcome::Success,
        );
        log_lifecycle_event(
            None,
            "phase.end_prepare",
            "could not reach referee",
            LifecycleOutcome::Fault,
        );
    }
}
