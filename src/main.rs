//! turbofan-diag - turbofan engine health diagnosis
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP API
//! turbofan-diag serve --addr 0.0.0.0:8080
//!
//! # Analyze one observation (24 comma-separated readings)
//! turbofan-diag analyze --values "-0.0007,-0.0004,100.0,518.67,641.82,..."
//!
//! # Analyze observations from a JSON file
//! turbofan-diag analyze --input snapshot.json
//!
//! # Validate a config file
//! turbofan-diag check-config --path turbofan.toml
//! ```
//!
//! # Environment Variables
//!
//! - `TURBOFAN_CONFIG`: Path to the pipeline config (default: ./turbofan.toml, then built-in defaults)
//! - `NARRATIVE_API_KEY`: Bearer token for the narrative backend (name configurable)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use turbofan_diag::api::{create_app, ApiState};
use turbofan_diag::config::PipelineConfig;
use turbofan_diag::pipeline::{Orchestrator, PipelineError};

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "turbofan-diag")]
#[command(about = "Turbofan engine health diagnosis pipeline")]
#[command(version)]
struct CliArgs {
    /// Pipeline config file (overrides TURBOFAN_CONFIG and ./turbofan.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Listen address (default: server.addr from config)
        #[arg(long, value_name = "HOST:PORT")]
        addr: Option<String>,
    },

    /// Run the pipeline once and print the result as JSON
    Analyze {
        /// JSON file: an array of 24 readings, `{"values": [...]}`, or an array of those
        #[arg(long, conflicts_with = "values", required_unless_present = "values")]
        input: Option<PathBuf>,

        /// 24 comma-separated readings
        #[arg(long, allow_hyphen_values = true)]
        values: Option<String>,
    },

    /// Load and validate a config file, then print the effective config
    CheckConfig {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

// ============================================================================
// Input parsing
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum ObservationInput {
    Raw(Vec<f64>),
    Wrapped { values: Vec<f64> },
}

impl ObservationInput {
    fn into_values(self) -> Vec<f64> {
        match self {
            Self::Raw(v) | Self::Wrapped { values: v } => v,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputFile {
    One(ObservationInput),
    Many(Vec<ObservationInput>),
}

fn parse_values(csv: &str) -> Result<Vec<f64>> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, s)| {
            s.parse::<f64>()
                .with_context(|| format!("Reading {i} is not a number: {s:?}"))
        })
        .collect()
}

fn read_input_file(path: &Path) -> Result<Vec<Vec<f64>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: InputFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(match parsed {
        InputFile::One(obs) => vec![obs.into_values()],
        InputFile::Many(all) => all.into_iter().map(ObservationInput::into_values).collect(),
    })
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(PipelineConfig::load()),
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn serve(config: PipelineConfig, addr: Option<String>) -> Result<()> {
    let addr: SocketAddr = addr
        .as_deref()
        .unwrap_or(&config.server.addr)
        .parse()
        .context("Invalid listen address")?;

    let orchestrator = Orchestrator::from_config(Arc::new(config))
        .context("Failed to build pipeline collaborators")?;
    let app = create_app(ApiState::new(Arc::new(orchestrator)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(%addr, "HTTP server listening");

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
        }
        shutdown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await
        .context("HTTP server error")?;

    info!("Graceful shutdown complete");
    Ok(())
}

async fn analyze(config: PipelineConfig, observations: Vec<Vec<f64>>) -> Result<()> {
    let orchestrator = Orchestrator::from_config(Arc::new(config))
        .context("Failed to build pipeline collaborators")?;

    let mut failures = 0usize;
    for (i, values) in observations.iter().enumerate() {
        match orchestrator.run_raw(values).await {
            Ok(state) => {
                println!("{}", serde_json::to_string_pretty(&state)?);
            }
            Err(PipelineError::Fatal { stage, cause, partial }) => {
                failures += 1;
                error!(observation = i, %stage, %cause, "Pipeline failed");
                println!("{}", serde_json::to_string_pretty(&partial)?);
            }
            Err(e) => {
                failures += 1;
                error!(observation = i, error = %e, "Pipeline failed");
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} observation(s) failed", observations.len());
    }
    Ok(())
}

fn check_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    print!("{}", config.to_toml().context("Failed to render config")?);
    info!("Configuration is valid");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let args = CliArgs::parse();
    init_logging(args.json_logs);
    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "Failed to read .env");
        }
    }

    match args.command {
        Command::Serve { addr } => {
            let config = load_config(args.config.as_deref())?;
            serve(config, addr).await
        }
        Command::Analyze { input, values } => {
            let observations = match (input, values) {
                (Some(path), _) => read_input_file(&path)?,
                (None, Some(csv)) => vec![parse_values(&csv)?],
                (None, None) => anyhow::bail!("Either --input or --values is required"),
            };
            let config = load_config(args.config.as_deref())?;
            analyze(config, observations).await
        }
        Command::CheckConfig { path } => check_config(path.as_deref().or(args.config.as_deref())),
    }
}
