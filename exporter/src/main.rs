//! Tasksheet - outstanding markdown tasks exported to CSV.
//!
//! # Commands
//!
//! - `tasksheet export`: Write the CSV once
//! - `tasksheet watch`: Export, then re-export whenever task documents change
//! - `tasksheet list`: Print the outstanding tasks without writing anything
//! - `tasksheet status`: Show when the CSV was last written
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options. Flags
//! given on the command line take precedence.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tasksheet_exporter::config::{parse_debounce_secs, Config};
use tasksheet_exporter::exporter::{ExportOutcome, Exporter};
use tasksheet_exporter::status::{last_export_time, status_line};
use tasksheet_exporter::types::{Delimiter, TaskRecord};
use tasksheet_exporter::watcher::{export_and_log, TaskWatcher};

/// Tasksheet - outstanding markdown tasks exported to CSV.
///
/// Scans `<vault>/<customers>/<customer>/**/<project>.md` for open tasks and
/// writes them, with their heading and parent-task context, to a CSV file.
#[derive(Parser, Debug)]
#[command(name = "tasksheet")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    TASKSHEET_VAULT_DIR          Root of the markdown tree (default: current directory)
    TASKSHEET_CUSTOMERS_FOLDER   Customers folder (default: Customers)
    TASKSHEET_OUTPUT_PATH        CSV path (default: outstanding_tasks.csv)
    TASKSHEET_DELIMITER          ',' or ';' (default: ',')
    TASKSHEET_COMPRESS_LEVELS    Drop empty level columns (default: false)
    TASKSHEET_INCLUDE_HEADER     Write the header row (default: true)
    TASKSHEET_DEBOUNCE_SECS      Watch quiet period, 1-30 (default: 3)
    TASKSHEET_COMPLETION_MARKER  Glyph marking done-with-date tasks (empty disables)

EXAMPLES:
    # Export once from the current vault
    tasksheet export

    # Semicolon-separated output for European spreadsheet locales
    tasksheet --delimiter ';' export

    # Keep the CSV up to date while editing
    tasksheet --vault ~/notes watch
")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Command-line overrides for environment configuration.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Root of the markdown tree.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Customers folder, relative to the vault.
    #[arg(long, global = true)]
    customers: Option<PathBuf>,

    /// CSV output path, relative to the vault unless absolute.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Field delimiter: ',' or ';'.
    #[arg(long, global = true)]
    delimiter: Option<Delimiter>,

    /// Drop empty hierarchy columns.
    #[arg(long, global = true)]
    compress: bool,

    /// Omit the header row.
    #[arg(long, global = true)]
    no_header: bool,

    /// Watch quiet period in seconds (1-30).
    #[arg(long, global = true, value_parser = parse_debounce_arg)]
    debounce: Option<u64>,

    /// Glyph that, followed by a date, marks a task done. Empty disables the check.
    #[arg(long, global = true)]
    completion_marker: Option<String>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Export outstanding tasks once.
    Export {
        /// Do not print a summary line.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Export now, then again whenever task documents change.
    ///
    /// Runs until interrupted with Ctrl+C or SIGTERM.
    Watch,

    /// Print outstanding tasks without writing the CSV.
    List {
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show when the CSV was last written.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    let config = load_config(&cli.overrides)?;
    debug!(?config, "Loaded configuration");

    match cli.command {
        Command::Export { quiet } => with_runtime(run_export(config, quiet)),
        Command::Watch => with_runtime(run_watch(config)),
        Command::List { json } => run_list(&config, json),
        Command::Status => {
            run_status(&config);
            Ok(())
        }
    }
}

/// Builds the runtime and drives `future` to completion.
fn with_runtime<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(future)
}

/// Loads configuration from the environment and applies CLI overrides.
fn load_config(overrides: &Overrides) -> Result<Config> {
    let mut config = Config::from_env().context("Failed to load configuration")?;

    if let Some(vault) = &overrides.vault {
        config.vault_dir.clone_from(vault);
    }
    if let Some(customers) = &overrides.customers {
        config.customers_folder.clone_from(customers);
    }
    if let Some(output) = &overrides.output {
        config.output_path.clone_from(output);
    }
    if let Some(delimiter) = overrides.delimiter {
        config.csv.delimiter = delimiter;
    }
    if overrides.compress {
        config.csv.compress_levels = true;
    }
    if overrides.no_header {
        config.csv.include_header = false;
    }
    if let Some(secs) = overrides.debounce {
        config.debounce_secs = secs;
    }
    if let Some(marker) = &overrides.completion_marker {
        config.completion_marker = marker.trim().to_string();
    }

    Ok(config)
}

/// Validates `--debounce` with the same rules as the environment variable.
fn parse_debounce_arg(val: &str) -> std::result::Result<u64, String> {
    parse_debounce_secs(val).map_err(|e| e.to_string())
}

/// Runs the export command.
async fn run_export(config: Config, quiet: bool) -> Result<()> {
    let exporter = Exporter::new(&config);

    let outcome = exporter
        .export()
        .await
        .context("Failed to export tasks")?;

    if !quiet {
        match outcome {
            ExportOutcome::Written { task_count, path } => {
                println!("Exported {task_count} task(s) to {}", path.display());
            }
            ExportOutcome::NoTasks => println!("No outstanding tasks found"),
            ExportOutcome::AlreadyRunning => println!("Export already in progress"),
        }
    }

    Ok(())
}

/// Runs the watch command until a shutdown signal arrives.
async fn run_watch(config: Config) -> Result<()> {
    let exporter = Arc::new(Exporter::new(&config));

    let watcher = TaskWatcher::start(Arc::clone(&exporter), config.debounce_interval())
        .context("Failed to start watching")?;

    export_and_log(&exporter).await;

    info!(
        output = %exporter.output_file().display(),
        "Watching for changes, press Ctrl+C to stop"
    );

    wait_for_shutdown().await;

    info!("Shutting down");
    watcher.stop().await.context("Failed to stop watcher")?;

    Ok(())
}

/// Runs the list command.
fn run_list(config: &Config, json: bool) -> Result<()> {
    let exporter = Exporter::new(config);

    if json {
        let rendered = exporter
            .preview_json()
            .context("Failed to serialize tasks")?;
        println!("{rendered}");
        return Ok(());
    }

    let records = exporter.preview();
    if records.is_empty() {
        println!("No outstanding tasks found");
        return Ok(());
    }

    for record in &records {
        println!("{}", format_record(record));
    }

    Ok(())
}

/// One-line rendering: `Customer / Project / Level / ... : Task`.
fn format_record(record: &TaskRecord) -> String {
    let mut trail: Vec<&str> = vec![&record.customer, &record.project];
    trail.extend(record.occupied_levels());
    format!("{}: {}", trail.join(" / "), record.task)
}

/// Runs the status command.
fn run_status(config: &Config) {
    let output = config.output_file();
    println!("{}", status_line(last_export_time(&output), Utc::now()));
}

/// Initializes the tracing subscriber.
///
/// Logs go to stderr so stdout stays clean for `list --json`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
