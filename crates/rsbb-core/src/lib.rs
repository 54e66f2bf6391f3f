//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Robot controller, benchmark state machine, and dispatch runtime."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
//! Core of the dummy robot: the benchmark stubs, the controller that owns the
//! single active instance, and the task that feeds it from the bus.

pub mod benchmark;
pub mod controller;
pub mod runtime;

pub use benchmark::{
    execute_override, hopf_result, Benchmark, BenchmarkContext, BenchmarkState, ExecuteOverride,
};
pub use controller::{
    ActiveBenchmark, ControllerStatus, LifecycleEvent, RobotController, SelectionOutcome,
    MESSAGES_SAVED,
};
pub use runtime::{RobotRuntime, RuntimeHandle};
