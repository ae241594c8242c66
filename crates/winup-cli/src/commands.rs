use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use winup_core::config::Config;
use winup_core::execution::ProcessExecutor;
use winup_core::models::{SourceAction, SourceId, SourceRun, SourceStatus, UpgradeOutcome};
use winup_core::persistence::HistoryStore;
use winup_core::pipeline::{RunMode, rollback_package, run_sources};
use winup_core::registry;
use winup_core::report::{RunReport, write_json_report};
use winup_core::sqlite::SqliteStore;

pub struct UpdateOptions {
    pub mode: RunMode,
    pub skip: Vec<SourceId>,
    pub report: Option<PathBuf>,
    pub record_history: bool,
}

pub fn update(
    config: &Config,
    executor: Arc<dyn ProcessExecutor>,
    options: UpdateOptions,
) -> Result<()> {
    let mut sources = config.sources.clone();
    for source in &options.skip {
        sources.get_mut(*source).enabled = false;
    }

    // Open history before touching any package so a broken store aborts early.
    let history = if options.record_history
        && options.mode == RunMode::Upgrade
        && config.history.enabled
    {
        Some(open_history(config)?)
    } else {
        None
    };

    let started_at = OffsetDateTime::now_utc();
    let adapters = registry::process_adapters(executor, &config.execution);
    let runs = run_sources(&adapters, &sources, options.mode);
    let report = RunReport::new(options.mode, started_at, runs);

    if let Some(store) = &history {
        let outcomes: Vec<UpgradeOutcome> = report
            .sources
            .iter()
            .flat_map(|run| run.outcomes.iter().cloned())
            .collect();
        if let Err(error) = store.append_outcomes(&outcomes) {
            tracing::error!(error = %error, "failed to record upgrade history");
        }
    }

    if let Some(path) = options.report.as_ref().or(config.report.path.as_ref())
        && let Err(error) = write_json_report(path, &report)
    {
        tracing::error!(error = %error, "failed to write run report");
    }

    print_report(&report);
    Ok(())
}

pub fn sources(config: &Config, executor: Arc<dyn ProcessExecutor>) -> Result<()> {
    println!("{:<12} {:<10} {:<12} PATH", "SOURCE", "STATUS", "VERSION");
    for adapter in registry::process_adapters(executor, &config.execution) {
        let descriptor = adapter.descriptor();
        let enabled = config.sources.get(descriptor.id).enabled;
        match adapter.detect() {
            Ok(info) => {
                let status = match (info.installed, enabled) {
                    (false, _) => "missing",
                    (true, false) => "disabled",
                    (true, true) => "available",
                };
                let path = info
                    .executable_path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<12} {:<10} {:<12} {}",
                    descriptor.id,
                    status,
                    info.version.as_deref().unwrap_or("-"),
                    path
                );
            }
            Err(error) => {
                println!("{:<12} {:<10} {:<12} {}", descriptor.id, "error", "-", error);
            }
        }
    }
    Ok(())
}

pub fn history(config: &Config, limit: usize) -> Result<()> {
    let store = open_history(config)?;
    let entries = store.recent(limit).context("failed to read upgrade history")?;

    if entries.is_empty() {
        println!("No upgrade history recorded.");
        return Ok(());
    }

    for entry in entries {
        let outcome = &entry.outcome;
        let when = outcome
            .started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| outcome.started_at.unix_timestamp().to_string());
        let result = if outcome.success {
            "ok".to_string()
        } else {
            format!("failed ({})", outcome.exit_code)
        };
        let kind = if outcome.action == SourceAction::Install {
            "  (rollback)"
        } else {
            ""
        };
        println!(
            "{when}  {:<10} {:<40} {} -> {}  {result}{kind}",
            outcome.source, outcome.package_id, outcome.from_version, outcome.to_version
        );
    }
    Ok(())
}

pub fn rollback(
    config: &Config,
    executor: Arc<dyn ProcessExecutor>,
    source: SourceId,
    package_id: &str,
    version: Option<String>,
) -> Result<()> {
    let history = if config.history.enabled {
        Some(open_history(config)?)
    } else {
        None
    };

    let last = match &history {
        Some(store) => store
            .last_successful_upgrade(source, package_id)
            .context("failed to read upgrade history")?,
        None => None,
    };

    let (current_version, target_version) = match (version, last) {
        (Some(version), Some(entry)) => (entry.outcome.to_version, version),
        (Some(version), None) => ("unknown".to_string(), version),
        (None, Some(entry)) => (entry.outcome.to_version, entry.outcome.from_version),
        (None, None) => bail!(
            "no recorded upgrade of {package_id} from {source}; pass --version to choose one"
        ),
    };

    let adapter = registry::process_adapter(source, executor, &config.execution);
    let outcome = rollback_package(
        adapter.as_ref(),
        package_id,
        &current_version,
        &target_version,
    )
    .with_context(|| format!("cannot roll back {package_id}"))?;

    if let Some(store) = &history
        && let Err(error) = store.append_outcomes(std::slice::from_ref(&outcome))
    {
        tracing::error!(error = %error, "failed to record rollback in history");
    }

    if outcome.success {
        println!("{source}: {package_id} rolled back to {target_version}");
    } else {
        println!("{source}: {}", outcome.error_line());
        if let Some(output) = &outcome.error_output {
            println!("{output}");
        }
    }
    Ok(())
}

fn open_history(config: &Config) -> Result<SqliteStore> {
    let path = config.history.resolved_path();
    let store = SqliteStore::new(&path);
    store
        .migrate_to_latest()
        .with_context(|| format!("failed to initialise history store {}", path.display()))?;
    Ok(store)
}

fn print_report(report: &RunReport) {
    for run in &report.sources {
        print_source(run);
    }
    if report.mode == RunMode::Upgrade {
        println!(
            "\n{} updated, {} failed",
            report.updated_count(),
            report.failed_count()
        );
    }
}

fn print_source(run: &SourceRun) {
    let summary = &run.summary;
    println!("{}: {}", summary.source, status_label(summary.status));

    if summary.status == SourceStatus::NotRun {
        for record in &run.packages {
            let pinned = if record.pinned { " (pinned)" } else { "" };
            println!(
                "  {:<40} {} -> {}{pinned}",
                record.id, record.current_version, record.available_version
            );
        }
    }

    if summary.updated_count > 0 {
        println!("  {} updated", summary.updated_count);
    }
    for error in &summary.errors {
        println!("  {error}");
    }
}

fn status_label(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::NotRun => "updates available",
        SourceStatus::Disabled => "disabled",
        SourceStatus::Unavailable => "not installed",
        SourceStatus::NoUpdates => "up to date",
        SourceStatus::Success => "success",
        SourceStatus::Partial => "partially updated",
        SourceStatus::Error => "error",
    }
}
