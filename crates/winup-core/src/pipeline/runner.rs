use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapters::{EnumerationMode, SourceAdapter};
use crate::config::{SourceSettings, SourcesConfig};
use crate::models::{SourceRun, SourceStatus, SourceSummary};

use super::{enumerate_upgradeable, upgrade_all};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Enumerate only; no upgrade command is invoked.
    ListOnly,
    Upgrade,
}

/// Runs one source end to end. Failures are folded into the returned summary.
pub fn run_source(
    adapter: &dyn SourceAdapter,
    settings: &SourceSettings,
    mode: RunMode,
) -> SourceRun {
    let source = adapter.descriptor().id;
    let span = tracing::info_span!("source", %source);
    let _entered = span.enter();

    if !settings.enabled {
        tracing::info!("source disabled; skipping");
        return SourceRun::terminal(source, SourceStatus::Disabled);
    }

    if !adapter.is_available() {
        tracing::warn!("source tool not available; skipping");
        return SourceRun::terminal(source, SourceStatus::Unavailable);
    }

    if adapter.enumeration_mode() == EnumerationMode::ScanOnly {
        return run_scan_only(adapter, mode);
    }

    let records = match enumerate_upgradeable(adapter, &settings.exclusion_set()) {
        Ok(records) => records,
        Err(error) => {
            tracing::error!(error = %error, "failed to enumerate upgradeable packages");
            return SourceRun {
                summary: SourceSummary::failed(source, error.to_string()),
                packages: Vec::new(),
                outcomes: Vec::new(),
            };
        }
    };

    match mode {
        RunMode::ListOnly => {
            let status = if records.is_empty() {
                SourceStatus::NoUpdates
            } else {
                SourceStatus::NotRun
            };
            for record in &records {
                tracing::info!(
                    package = %record.id,
                    from = %record.current_version,
                    to = %record.available_version,
                    pinned = record.pinned,
                    "update available"
                );
            }
            SourceRun {
                summary: SourceSummary::terminal(source, status),
                packages: records,
                outcomes: Vec::new(),
            }
        }
        RunMode::Upgrade => {
            let (summary, outcomes) = upgrade_all(adapter, &records);
            tracing::info!(
                status = summary.status.as_str(),
                updated = summary.updated_count,
                failed = summary.errors.len(),
                "source finished"
            );
            SourceRun {
                summary,
                packages: records,
                outcomes,
            }
        }
    }
}

/// Runs every adapter in the order given; one source never stops the next.
pub fn run_sources(
    adapters: &[Arc<dyn SourceAdapter>],
    sources: &SourcesConfig,
    mode: RunMode,
) -> Vec<SourceRun> {
    adapters
        .iter()
        .map(|adapter| {
            let settings = sources.get(adapter.descriptor().id);
            run_source(adapter.as_ref(), settings, mode)
        })
        .collect()
}

// Without a per-package catalog the only action is asking the OS to scan.
fn run_scan_only(adapter: &dyn SourceAdapter, mode: RunMode) -> SourceRun {
    let source = adapter.descriptor().id;

    if mode == RunMode::ListOnly {
        tracing::info!("source only supports a system scan; nothing to list");
        return SourceRun::terminal(source, SourceStatus::NotRun);
    }

    match adapter.trigger_scan() {
        Ok(()) => {
            tracing::info!("update scan triggered");
            SourceRun::terminal(source, SourceStatus::Success)
        }
        Err(error) => {
            tracing::error!(error = %error, "failed to trigger update scan");
            SourceRun {
                summary: SourceSummary::failed(source, error.to_string()),
                packages: Vec::new(),
                outcomes: Vec::new(),
            }
        }
    }
}
