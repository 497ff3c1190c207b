//! CLI definition

use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

/// LessonBuilder - turn a topic into a Jupyter notebook lesson
#[derive(Debug, Parser)]
#[command(
    name = "lb",
    about = "Plan, approve, research and generate a Jupyter notebook lesson",
    version
)]
pub struct Cli {
    /// Lesson topic (suggested by the model when omitted)
    #[arg(value_name = "TOPIC")]
    pub topic: Option<String>,

    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Directory the notebook is written to (overrides output.dir)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Skip the research step
    #[arg(long)]
    pub no_research: bool,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = log_dir().join("lessonbuilder.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Directory holding the log file
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lessonbuilder")
        .join("logs")
}
