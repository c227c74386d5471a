//! Logger setup for the gradewatch binary.

use std::fs::{File, OpenOptions};
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Opened in append mode in the working directory.
pub const LOG_FILENAME: &str = "gradewatch.log";

/// Targets that never produce grade-relevant lines.
const QUIET_TARGETS: [&str; 3] = ["hyper", "reqwest", "rustls"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    File,
    Terminal,
    Both,
}

impl LogDestination {
    fn terminal(self) -> bool {
        matches!(self, LogDestination::Terminal | LogDestination::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogDestination::File | LogDestination::Both)
    }
}

pub fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install the global logger. Output falls back to the terminal when the log
/// file cannot be opened.
pub fn initialize(destination: LogDestination, verbose: bool) {
    let level = level_for(verbose);
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    let mut file_error = None;

    if destination.file() {
        match open_log_file(Path::new(LOG_FILENAME)) {
            Ok(file) => loggers.push(WriteLogger::new(level, build_config(), file)),
            Err(err) => file_error = Some(err),
        }
    }
    if destination.terminal() || loggers.is_empty() {
        loggers.push(TermLogger::new(
            level,
            build_config(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }

    let _ = CombinedLogger::init(loggers);
    if let Some(err) = file_error {
        log::warn!("Could not open {}: {}; logging to terminal", LOG_FILENAME, err);
    }
}

fn build_config() -> Config {
    let mut builder = ConfigBuilder::new();
    builder
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error);
    for target in QUIET_TARGETS {
        builder.add_filter_ignore_str(target);
    }
    builder.build()
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
