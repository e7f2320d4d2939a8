//! Model router
//!
//! An OpenAI-compatible front door for pools of model deployments.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                 MODEL ROUTER                  │
//!                         │                                               │
//!     POST /v1/*          │  ┌─────────┐   ┌──────────┐   ┌────────────┐  │
//!     ────────────────────┼─▶│  http   │──▶│ security │──▶│   proxy    │  │
//!                         │  │ server  │   │auth/limit│   │  dispatch  │  │
//!                         │  └─────────┘   └──────────┘   └─────┬──────┘  │
//!                         │                                     │         │
//!                         │                 ┌───────────────────┤         │
//!                         │                 ▼                   ▼         │
//!                         │         ┌──────────────┐    ┌────────────┐    │
//!                         │         │load_balancer │    │   relay    │────┼──▶ Backend
//!                         │         │ pools+health │    │stream/body │    │    deployments
//!                         │         └──────▲───────┘    └────────────┘    │
//!                         │                │                              │
//!                         │         ┌──────┴───────┐                      │
//!                         │         │health sweep  │                      │
//!                         │         └──────────────┘                      │
//!                         └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use model_router::config::{load_config, ObservabilityConfig};
use model_router::lifecycle;
use model_router::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "model-router")]
#[command(about = "OpenAI-compatible model router with failover", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&ObservabilityConfig::default());
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        bind_address = %config.server.bind_address,
        "model-router starting"
    );

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
