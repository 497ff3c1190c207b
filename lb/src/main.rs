//! LessonBuilder - human-in-the-loop lesson notebook builder
//!
//! CLI entry point: one topic per run, approved interactively.

use std::fs;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use lessonbuilder::cli::{Cli, get_log_path, log_dir};
use lessonbuilder::config::Config;
use lessonbuilder::llm::create_client;
use lessonbuilder::prompts::PromptLoader;
use lessonbuilder::workflow::{TerminalInput, Workflow, WorkflowState};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(get_log_path()).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.output_dir {
        debug!(?dir, "main: output dir overridden");
        config.output.dir = dir.clone();
    }
    if cli.no_research {
        debug!("main: research disabled by flag");
        config.research.enabled = false;
    }
    config.validate()?;

    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        research = config.research.enabled,
        "LessonBuilder loaded config"
    );

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let prompts = Arc::new(PromptLoader::new(cwd));
    let workflow = Workflow::from_config(llm, prompts, &config)?;

    let topic = cli.topic.unwrap_or_default();
    let mut input = TerminalInput::new();
    let state = workflow.run(WorkflowState::new(topic), &mut input).await?;

    print_summary(&state);
    Ok(())
}

fn print_summary(state: &WorkflowState) {
    println!();
    if let Some(path) = &state.notebook_file {
        println!("{} {}", "Notebook written:".green().bold(), path.display());
        if !state.cells.is_parsed() {
            println!(
                "{}",
                "The generated lesson could not be parsed; the notebook holds the raw output.".yellow()
            );
        }
    } else if let Some(error) = &state.save_error {
        println!("{} {}", "Failed to save notebook:".red().bold(), error);
    } else if !state.approved {
        println!("{}", "Plan not approved, no notebook written.".yellow());
    } else {
        println!("{}", "No cells were generated, no notebook written.".yellow());
    }
}
