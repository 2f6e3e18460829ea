#![deny(missing_docs)]
//! Shared logging utilities for the harvester workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every message emitted
//! through the macros carries the harvest step that was active on the calling
//! thread, so a log line can always be tied back to a pagination step.

use std::cell::Cell;

thread_local! {
    /// Thread-local storage for the harvest step currently being processed.
    static HARVEST_STEP: Cell<u64> = const { Cell::new(0) };
}

/// Sets the harvest step for the current thread.
/// The harvest loop calls this whenever it moves on to a new step.
pub fn set_step(step: u64) {
    HARVEST_STEP.with(|v| v.set(step));
}

/// Retrieves the harvest step for the current thread.
/// Returns 0 while the harvest is still initializing.
pub fn current_step() -> u64 {
    HARVEST_STEP.with(|v| v.get())
}

/// Prefix rendered in front of every macro-emitted message.
///
/// Empty during initialization (step 0), `[step N] ` afterwards.
pub fn step_prefix() -> String {
    match current_step() {
        0 => String::new(),
        step => format!("[step {step}] "),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::step_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::step_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::step_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::step_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::step_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_empty_before_first_step() {
        set_step(0);
        assert_eq!(step_prefix(), "");
    }

    #[test]
    fn prefix_tracks_current_step() {
        set_step(12);
        assert_eq!(current_step(), 12);
        assert_eq!(step_prefix(), "[step 12] ");
        set_step(0);
    }
}
