use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::{CoreError, CoreErrorKind, SourceRun, SourceStatus};
use crate::pipeline::RunMode;

/// Everything a single `update` or `check` invocation produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: RunMode,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub sources: Vec<SourceRun>,
}

impl RunReport {
    pub fn new(mode: RunMode, started_at: OffsetDateTime, sources: Vec<SourceRun>) -> Self {
        Self {
            mode,
            started_at,
            finished_at: OffsetDateTime::now_utc(),
            sources,
        }
    }

    pub fn updated_count(&self) -> usize {
        self.sources.iter().map(|run| run.summary.updated_count).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.sources
            .iter()
            .flat_map(|run| run.outcomes.iter())
            .filter(|outcome| !outcome.success)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.sources.iter().any(|run| {
            matches!(
                run.summary.status,
                SourceStatus::Error | SourceStatus::Partial
            )
        })
    }
}

pub fn write_json_report(path: &Path, report: &RunReport) -> Result<(), CoreError> {
    let rendered = serde_json::to_string_pretty(report).map_err(|error| {
        report_error(format!("failed to serialize run report: {error}"))
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|error| {
            report_error(format!(
                "failed to create report directory {}: {error}",
                parent.display()
            ))
        })?;
    }

    fs::write(path, rendered).map_err(|error| {
        report_error(format!("failed to write report {}: {error}", path.display()))
    })?;

    tracing::info!(path = %path.display(), "wrote run report");
    Ok(())
}

fn report_error(message: String) -> CoreError {
    CoreError::new(None, None, CoreErrorKind::StorageFailure, message)
}
