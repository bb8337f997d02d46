//! voladjust CLI
//!
//! Command-line entry point: `voladjust <path> [mode]`.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use voladjust::cli::{commands, Cli};
use voladjust::VolumeError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(suggestion) = e
                .downcast_ref::<VolumeError>()
                .and_then(VolumeError::recovery_suggestion)
            {
                eprintln!("{}", suggestion);
            }
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    info!("voladjust v{}", env!("CARGO_PKG_VERSION"));

    let batch = commands::adjust(cli).context("volume adjustment aborted")?;

    if let Some(report) = &cli.report {
        batch
            .write_json(report)
            .with_context(|| format!("failed to write report to {}", report.display()))?;
    }

    Ok(batch.is_success())
}
