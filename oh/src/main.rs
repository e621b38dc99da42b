//! Overlayhub - overlay manager and cross-frame coordinator
//!
//! CLI entry point for running the in-memory page simulator.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use overlayhub::cli::{Cli, Command, OutputFormat};
use overlayhub::config::Config;
use overlayhub::scenario::{self, Scenario, Trace, TraceKind};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("overlayhub")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level/--verbose > config file > INFO
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

    let log_file = fs::File::create(log_dir.join("overlayhub.log")).context("Failed to create log file")?;

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

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.requested_log_level(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Simulate { scenario, format }) => cmd_simulate(&config, scenario, format).await,
        Some(Command::Config) => cmd_config(&config),
        None => cmd_simulate(&config, None, OutputFormat::Text).await,
    }
}

/// Run one scenario, or all of them, and print the traces
async fn cmd_simulate(config: &Config, scenario: Option<Scenario>, format: OutputFormat) -> Result<()> {
    debug!(?scenario, %format, "cmd_simulate: called");
    let scenarios = match scenario {
        Some(scenario) => vec![scenario],
        None => Scenario::ALL.to_vec(),
    };

    let mut traces = Vec::new();
    for scenario in scenarios {
        let trace = scenario::run(scenario, config)
            .await
            .with_context(|| format!("Scenario {} failed", scenario))?;
        traces.push(trace);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&traces)?),
        OutputFormat::Text => {
            for trace in &traces {
                print_trace(trace);
            }
        }
    }
    Ok(())
}

fn print_trace(trace: &Trace) {
    println!("{}", format!("== {} ==", trace.scenario).bright_cyan().bold());
    for line in &trace.lines {
        match line.kind {
            TraceKind::Upward => println!("  {} {} {}", "\u{2191}".yellow(), line.window.bold(), line.text),
            TraceKind::Downward => println!("  {} {} {}", "\u{2193}".green(), line.window.bold(), line.text),
            TraceKind::Event => println!("  {} {}", "\u{2022}".dimmed(), line.text.italic()),
        }
    }
    println!(
        "  {} upward, {} downward\n",
        trace.count(TraceKind::Upward),
        trace.count(TraceKind::Downward)
    );
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
