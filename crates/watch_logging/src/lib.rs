#![deny(missing_docs)]
//! Shared logging utilities for the gradewatch workspace.
//!
//! This crate provides the `watch_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every line logged
//! through the macros carries the number of the poll cycle that produced it.

use std::cell::Cell;
use std::fmt;

#[doc(hidden)]
pub use log;

thread_local! {
    /// Thread-local storage for the current poll cycle number.
    static POLL_CYCLE: Cell<u64> = const { Cell::new(0) };
}

/// Sets the poll cycle number for the current thread.
/// The poll loop calls this once at the start of each cycle.
pub fn set_poll_cycle(cycle: u64) {
    POLL_CYCLE.with(|v| v.set(cycle));
}

/// Retrieves the poll cycle number for the current thread.
/// Returns 0 outside of any cycle.
pub fn poll_cycle() -> u64 {
    POLL_CYCLE.with(|v| v.get())
}

/// Log line prefix naming the current poll cycle; empty outside of a cycle.
#[doc(hidden)]
pub struct CyclePrefix(u64);

impl CyclePrefix {
    /// Captures the cycle number of the calling thread.
    pub fn current() -> Self {
        Self(poll_cycle())
    }
}

impl fmt::Display for CyclePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            Ok(())
        } else {
            write!(f, "[cycle {}] ", self.0)
        }
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! watch_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("{}{}", $crate::CyclePrefix::current(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! watch_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("{}{}", $crate::CyclePrefix::current(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! watch_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("{}{}", $crate::CyclePrefix::current(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! watch_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("{}{}", $crate::CyclePrefix::current(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! watch_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("{}{}", $crate::CyclePrefix::current(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
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
