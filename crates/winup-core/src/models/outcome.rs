use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::{PackageRecord, SourceAction, SourceId};

/// Result of one single-package upgrade (or rollback) command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeOutcome {
    pub source: SourceId,
    /// `Upgrade` for pipeline upgrades, `Install` for rollbacks.
    pub action: SourceAction,
    pub package_id: String,
    pub from_version: String,
    pub to_version: String,
    pub success: bool,
    pub exit_code: i32,
    pub duration_seconds: f64,
    pub error_output: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

impl UpgradeOutcome {
    pub fn error_line(&self) -> String {
        format!("{} failed (exit code {})", self.package_id, self.exit_code)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SourceStatus {
    NotRun,
    Disabled,
    Unavailable,
    NoUpdates,
    Success,
    Partial,
    Error,
}

impl SourceStatus {
    /// Status for a batch that produced at least one attempt or skip.
    pub fn classify(success_count: usize, fail_count: usize) -> Self {
        if fail_count == 0 {
            Self::Success
        } else if success_count > 0 {
            Self::Partial
        } else {
            Self::Error
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRun => "not_run",
            Self::Disabled => "disabled",
            Self::Unavailable => "unavailable",
            Self::NoUpdates => "no_updates",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: SourceId,
    pub status: SourceStatus,
    pub updated_count: usize,
    pub errors: Vec<String>,
}

impl SourceSummary {
    /// Summary for a source that never reached the upgrade stage.
    pub fn terminal(source: SourceId, status: SourceStatus) -> Self {
        Self {
            source,
            status,
            updated_count: 0,
            errors: Vec::new(),
        }
    }

    pub fn failed(source: SourceId, error: impl Into<String>) -> Self {
        Self {
            source,
            status: SourceStatus::Error,
            updated_count: 0,
            errors: vec![error.into()],
        }
    }

    pub fn from_outcomes(source: SourceId, outcomes: &[UpgradeOutcome]) -> Self {
        let success_count = outcomes.iter().filter(|outcome| outcome.success).count();
        let errors: Vec<String> = outcomes
            .iter()
            .filter(|outcome| !outcome.success)
            .map(UpgradeOutcome::error_line)
            .collect();

        Self {
            source,
            status: SourceStatus::classify(success_count, errors.len()),
            updated_count: success_count,
            errors,
        }
    }
}

/// Everything one source produced during a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceRun {
    pub summary: SourceSummary,
    pub packages: Vec<PackageRecord>,
    pub outcomes: Vec<UpgradeOutcome>,
}

impl SourceRun {
    pub fn terminal(source: SourceId, status: SourceStatus) -> Self {
        Self {
            summary: SourceSummary::terminal(source, status),
            packages: Vec::new(),
            outcomes: Vec::new(),
        }
    }
}
