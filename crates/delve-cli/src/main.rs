//! CLI entry point for Delve.
//!
//! The `delve` binary replays a scripted model against the orchestration
//! loop, printing every notification as one JSON line on stdout.  Logs go
//! to stderr so stdout stays machine-readable.

mod tools;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use delve_agent::{AgentConfig, Controller, Notifier, ScriptedModel, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Delve: a model/tool orchestration loop with a persistent code sandbox.
#[derive(Parser)]
#[command(name = "delve", version, about = "Delve orchestration engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task against a scripted model.
    Replay {
        /// The task given to the model.
        task: String,

        /// JSON file holding the scripted model turns.
        #[arg(long)]
        script: PathBuf,

        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the iteration cap.
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Log at debug level.
        #[arg(long, short)]
        verbose: bool,
    },

    /// Print the tool schemas as JSON.
    Schemas {
        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            task,
            script,
            config,
            max_iterations,
            verbose,
        } => {
            init_tracing(if verbose { "debug" } else { "info" });
            cmd_replay(task, &script, config.as_deref(), max_iterations).await
        }
        Commands::Schemas { config } => {
            init_tracing("warn");
            cmd_schemas(config.as_deref())
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: replay
// ---------------------------------------------------------------------------

async fn cmd_replay(
    task: String,
    script: &Path,
    config_path: Option<&Path>,
    max_iterations: Option<u32>,
) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if let Some(max_iterations) = max_iterations {
        config = config.with_max_iterations(max_iterations);
    }

    let turns = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;
    let model = ScriptedModel::from_json(config.model.clone(), &turns)
        .with_context(|| format!("failed to parse script {}", script.display()))?;
    info!(turns = model.remaining(), "script loaded");

    let registry = build_registry()?;
    let (notifier, mut rx) = Notifier::channel();
    let mut controller = Controller::new(task, config, Arc::new(model), registry, notifier)
        .context("failed to create controller")?;

    let cancel = CancellationToken::new();
    let controller_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling task");
            controller_cancel.cancel();
        }
    });
    controller = controller.with_cancellation(cancel);

    let printer = tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            match serde_json::to_string(&notification) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to encode notification"),
            }
        }
    });

    let report = controller.run().await;
    drop(controller);
    printer.await.context("notification printer failed")?;

    info!(
        task_id = %report.task_id,
        state = ?report.state,
        iterations = report.iterations,
        "replay finished"
    );

    Ok(if report.is_done() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ---------------------------------------------------------------------------
// Subcommand: schemas
// ---------------------------------------------------------------------------

fn cmd_schemas(config_path: Option<&Path>) -> Result<ExitCode> {
    // Validates the config even though the schemas do not depend on it.
    load_config(config_path)?;
    let registry = build_registry()?;
    let json = serde_json::to_string_pretty(&registry.schemas())
        .context("failed to encode schemas")?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    let config = match path {
        Some(path) => AgentConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AgentConfig::default(),
    };
    config
        .with_env_overrides()
        .context("invalid environment override")
}

fn build_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new().context("failed to build tool registry")?;
    tools::register(&mut registry).context("failed to register host tools")?;
    Ok(registry)
}

/// Initialize the `tracing` subscriber on stderr.
///
/// Respects the `RUST_LOG` environment variable; falls back to
/// `default_level`.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
