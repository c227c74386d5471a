use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::logging::LogDestination;

/// Watches the student portal transcript and announces new or changed grades.
#[derive(Debug, Parser)]
#[command(name = "gradewatch", version, about)]
pub struct Cli {
    /// Dotenv file re-read before every check. Values there override the process environment.
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// SQLite database holding the known grades.
    #[arg(long, default_value = "grades.db")]
    pub db: PathBuf,

    /// Directory for the copy of the last downloaded transcript.
    #[arg(long, default_value = ".")]
    pub archive_dir: PathBuf,

    /// Do not keep a copy of the downloaded transcript.
    #[arg(long)]
    pub no_archive: bool,

    /// Run a single check and exit.
    #[arg(long)]
    pub once: bool,

    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}
