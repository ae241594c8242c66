mod cli;
mod commands;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use winup_core::config::Config;
use winup_core::execution::{ProcessExecutor, TokioProcessExecutor};
use winup_core::models::SourceId;
use winup_core::pipeline::RunMode;

use crate::cli::{Cli, Commands};
use crate::commands::UpdateOptions;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    logging::init(&config.logging, cli.verbose)?;

    // Adapters are synchronous and block on process futures, so the runtime
    // only needs to be entered on this thread.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let _runtime_guard = runtime.enter();

    let executor: Arc<dyn ProcessExecutor> = Arc::new(TokioProcessExecutor);

    match cli.command {
        Commands::Check => commands::update(
            &config,
            executor,
            UpdateOptions {
                mode: RunMode::ListOnly,
                skip: Vec::new(),
                report: None,
                record_history: false,
            },
        ),
        Commands::Update {
            list_only,
            skip_winget,
            skip_chocolatey,
            skip_store,
            report,
            no_history,
        } => {
            let skip = [
                (skip_winget, SourceId::Winget),
                (skip_chocolatey, SourceId::Chocolatey),
                (skip_store, SourceId::Store),
            ]
            .into_iter()
            .filter_map(|(skipped, source)| skipped.then_some(source))
            .collect();

            commands::update(
                &config,
                executor,
                UpdateOptions {
                    mode: if list_only {
                        RunMode::ListOnly
                    } else {
                        RunMode::Upgrade
                    },
                    skip,
                    report,
                    record_history: !no_history,
                },
            )
        }
        Commands::Sources => commands::sources(&config, executor),
        Commands::History { limit } => commands::history(&config, limit),
        Commands::Rollback {
            source,
            package_id,
            version,
        } => commands::rollback(&config, executor, source, &package_id, version),
    }
}
