// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paperwerk — scanned document workflow engine
//
// Entry point. Parses the command line, loads the configuration, initialises
// logging and backend services, and runs the requested command.

mod cli;
mod services;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use services::app_services::AppServices;
use services::data_dir;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, created) = match data_dir::resolve_config(cli.data_dir.clone(), |key| std::env::var(key).ok()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("paperwerk: cannot load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let default_filter = if cli.verbose { "debug" } else { config.log_filter.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(data_dir = %config.data_dir.display(), config_created = created, "Paperwerk starting");

    let services = match AppServices::init(config) {
        Ok(services) => services,
        Err(e) => {
            tracing::error!(error = %e, "backend services failed to start");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(config = ?services.config(), "effective configuration");

    match cli::run(cli.command, services).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.requires_operator() {
                tracing::error!(error = %e, "store and archive disagree; operator action required");
            }
            eprintln!("paperwerk: {e}");
            ExitCode::FAILURE
        }
    }
}
