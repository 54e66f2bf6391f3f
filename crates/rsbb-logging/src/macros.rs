//! ---
//! rsbb_section: "03-logging"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Structured logging helpers and macros."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---

/// Emit an informational log enriched with robot context.
#[macro_export]
macro_rules! rsbb_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::INFO,
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a debug log enriched with robot context.
#[macro_export]
macro_rules! rsbb_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::DEBUG,
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a warning enriched with robot context.
#[macro_export]
macro_rules! rsbb_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::WARN,
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an error log enriched with robot context.
#[macro_export]
macro_rules! rsbb_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::ERROR,
            robot = ctx.robot.unwrap_or(""),
            benchmark = ctx.benchmark.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}
