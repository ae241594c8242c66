//! Enumeration and one-at-a-time upgrade of packages from a single source.
//!
//! Package managers serialize access to their install state, so upgrades run
//! strictly in sequence and each command is awaited to completion.

pub mod runner;

use std::time::Instant;

use time::OffsetDateTime;

use crate::adapters::{
    AdapterResult, CommandOutcome, NO_EXIT_CODE, SourceAdapter, ensure_action_supported,
};
use crate::models::{
    CoreError, CoreErrorKind, ExclusionSet, PackageRecord, SourceAction, SourceStatus,
    SourceSummary, UpgradeOutcome,
};

pub use runner::{RunMode, run_source, run_sources};

/// Lists upgradeable packages and drops configured exclusions.
///
/// Callers check [`SourceAdapter::is_available`] first; an error here means
/// the tool exists but its listing could not be captured.
pub fn enumerate_upgradeable(
    adapter: &dyn SourceAdapter,
    exclusions: &ExclusionSet,
) -> AdapterResult<Vec<PackageRecord>> {
    let source = adapter.descriptor().id;
    let candidates = adapter.list_upgradeable()?;
    let found = candidates.len();

    let records: Vec<PackageRecord> = candidates
        .into_iter()
        .filter(|record| !record.id.trim().is_empty())
        .filter(|record| {
            let excluded = exclusions.contains(&record.id);
            if excluded {
                tracing::info!(%source, package = %record.id, "excluded by configuration");
            }
            !excluded
        })
        .collect();

    tracing::info!(
        %source,
        found,
        upgradeable = records.len(),
        "enumerated upgradeable packages"
    );

    Ok(records)
}

/// Upgrades every record in order and classifies the batch.
pub fn upgrade_all(
    adapter: &dyn SourceAdapter,
    records: &[PackageRecord],
) -> (SourceSummary, Vec<UpgradeOutcome>) {
    let source = adapter.descriptor().id;

    if records.is_empty() {
        return (SourceSummary::terminal(source, SourceStatus::NoUpdates), Vec::new());
    }

    let mut outcomes = Vec::with_capacity(records.len());

    for record in records {
        if record.pinned {
            tracing::info!(
                %source,
                package = %record.id,
                version = %record.current_version,
                "skipping pinned package"
            );
            continue;
        }

        tracing::info!(
            %source,
            package = %record.id,
            from = %record.current_version,
            to = %record.available_version,
            "upgrading package"
        );

        let started_at = OffsetDateTime::now_utc();
        let start = Instant::now();
        let result = adapter.upgrade_one(&record.id);
        let duration_seconds = start.elapsed().as_secs_f64();

        let outcome = build_outcome(
            adapter,
            SourceAction::Upgrade,
            &record.id,
            &record.current_version,
            &record.available_version,
            result,
            started_at,
            duration_seconds,
        );
        log_outcome(&outcome);
        outcomes.push(outcome);
    }

    let summary = SourceSummary::from_outcomes(source, &outcomes);
    (summary, outcomes)
}

/// Reinstalls `version` of a package previously upgraded away from it.
pub fn rollback_package(
    adapter: &dyn SourceAdapter,
    package_id: &str,
    current_version: &str,
    version: &str,
) -> AdapterResult<UpgradeOutcome> {
    let descriptor = adapter.descriptor();
    ensure_action_supported(descriptor, SourceAction::Install)?;

    if package_id.trim().is_empty() || version.trim().is_empty() {
        return Err(CoreError::new(
            Some(descriptor.id),
            Some(SourceAction::Install),
            CoreErrorKind::InvalidInput,
            "rollback needs a package id and a target version",
        ));
    }

    if !adapter.is_available() {
        return Err(CoreError::new(
            Some(descriptor.id),
            Some(SourceAction::Install),
            CoreErrorKind::NotInstalled,
            format!("{} is not installed on this host", descriptor.display_name),
        ));
    }

    tracing::info!(
        source = %descriptor.id,
        package = %package_id,
        from = %current_version,
        to = %version,
        "rolling back package"
    );

    let started_at = OffsetDateTime::now_utc();
    let start = Instant::now();
    let result = adapter.install_version(package_id, version);
    let duration_seconds = start.elapsed().as_secs_f64();

    let outcome = build_outcome(
        adapter,
        SourceAction::Install,
        package_id,
        current_version,
        version,
        result,
        started_at,
        duration_seconds,
    );
    log_outcome(&outcome);
    Ok(outcome)
}

fn build_outcome(
    adapter: &dyn SourceAdapter,
    action: SourceAction,
    package_id: &str,
    from_version: &str,
    to_version: &str,
    result: AdapterResult<CommandOutcome>,
    started_at: OffsetDateTime,
    duration_seconds: f64,
) -> UpgradeOutcome {
    // A command that could not run or finish counts against this package only.
    let (exit_code, output) = match result {
        Ok(command) => (command.exit_code, command.output),
        Err(error) => (NO_EXIT_CODE, error.to_string()),
    };
    let success = exit_code == 0;

    UpgradeOutcome {
        source: adapter.descriptor().id,
        action,
        package_id: package_id.to_string(),
        from_version: from_version.to_string(),
        to_version: to_version.to_string(),
        success,
        exit_code,
        duration_seconds,
        error_output: (!success).then_some(output),
        started_at,
    }
}

fn log_outcome(outcome: &UpgradeOutcome) {
    if outcome.success {
        tracing::info!(
            source = %outcome.source,
            package = %outcome.package_id,
            version = %outcome.to_version,
            duration_seconds = outcome.duration_seconds,
            result = "success",
            "package updated"
        );
    } else {
        tracing::error!(
            source = %outcome.source,
            package = %outcome.package_id,
            exit_code = outcome.exit_code,
            output = outcome.error_output.as_deref().unwrap_or_default(),
            "package update failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::adapters::{AdapterResult, CommandOutcome, SourceAdapter};
    use crate::models::{
        Capability, CoreError, CoreErrorKind, DetectionInfo, ExclusionSet, PackageRecord,
        SourceAction, SourceDescriptor, SourceId, SourceStatus,
    };

    use super::{enumerate_upgradeable, rollback_package, upgrade_all};

    const DESCRIPTOR: SourceDescriptor = SourceDescriptor {
        id: SourceId::Chocolatey,
        display_name: "Scripted",
        capabilities: &[
            Capability::Detect,
            Capability::ListOutdated,
            Capability::Upgrade,
            Capability::Install,
        ],
    };

    /// Adapter returning canned records and per-package exit codes.
    struct ScriptedAdapter {
        records: Vec<PackageRecord>,
        exit_codes: Vec<(&'static str, i32)>,
        upgraded: Mutex<Vec<String>>,
    }

    impl ScriptedAdapter {
        fn new(records: Vec<PackageRecord>, exit_codes: Vec<(&'static str, i32)>) -> Self {
            Self {
                records,
                exit_codes,
                upgraded: Mutex::new(Vec::new()),
            }
        }

        fn upgraded(&self) -> Vec<String> {
            self.upgraded.lock().unwrap().clone()
        }
    }

    impl SourceAdapter for ScriptedAdapter {
        fn descriptor(&self) -> &SourceDescriptor {
            &DESCRIPTOR
        }

        fn detect(&self) -> AdapterResult<DetectionInfo> {
            Ok(DetectionInfo {
                installed: true,
                executable_path: None,
                version: Some("2.2.2".to_string()),
            })
        }

        fn list_upgradeable(&self) -> AdapterResult<Vec<PackageRecord>> {
            Ok(self.records.clone())
        }

        fn upgrade_one(&self, package_id: &str) -> AdapterResult<CommandOutcome> {
            self.upgraded.lock().unwrap().push(package_id.to_string());
            if package_id == "spawn-fails" {
                return Err(CoreError::new(
                    Some(SourceId::Chocolatey),
                    Some(SourceAction::Upgrade),
                    CoreErrorKind::ProcessFailure,
                    "failed to spawn",
                ));
            }
            let exit_code = self
                .exit_codes
                .iter()
                .find(|(id, _)| *id == package_id)
                .map(|(_, code)| *code)
                .unwrap_or(0);
            Ok(CommandOutcome {
                exit_code,
                output: format!("output for {package_id}"),
            })
        }

        fn install_version(&self, package_id: &str, version: &str) -> AdapterResult<CommandOutcome> {
            self.upgraded
                .lock()
                .unwrap()
                .push(format!("{package_id}@{version}"));
            Ok(CommandOutcome {
                exit_code: 0,
                output: String::new(),
            })
        }
    }

    fn record(id: &str, pinned: bool) -> PackageRecord {
        PackageRecord {
            name: id.to_string(),
            id: id.to_string(),
            current_version: "1.0".to_string(),
            available_version: "2.0".to_string(),
            pinned,
        }
    }

    #[test]
    fn exclusions_remove_matching_ids_case_insensitively() {
        let adapter = ScriptedAdapter::new(
            vec![record("GoogleChrome", false), record("7zip", false), record("git", true)],
            vec![],
        );
        let exclusions = ExclusionSet::new(["googlechrome", "not-present"]);

        let records = enumerate_upgradeable(&adapter, &exclusions).unwrap();

        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["7zip", "git"]);
    }

    #[test]
    fn empty_records_report_no_updates_without_commands() {
        let adapter = ScriptedAdapter::new(vec![], vec![]);

        let (summary, outcomes) = upgrade_all(&adapter, &[]);

        assert_eq!(summary.status, SourceStatus::NoUpdates);
        assert_eq!(summary.updated_count, 0);
        assert!(summary.errors.is_empty());
        assert!(outcomes.is_empty());
        assert!(adapter.upgraded().is_empty());
    }

    #[test]
    fn pinned_packages_are_skipped() {
        let records = vec![record("7zip", false), record("git", true)];
        let adapter = ScriptedAdapter::new(records.clone(), vec![]);

        let (summary, outcomes) = upgrade_all(&adapter, &records);

        assert_eq!(adapter.upgraded(), vec!["7zip".to_string()]);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].package_id, "7zip");
        assert_eq!(summary.status, SourceStatus::Success);
        assert_eq!(summary.updated_count, 1);
    }

    #[test]
    fn all_pinned_classifies_as_success() {
        let records = vec![record("git", true), record("nodejs", true)];
        let adapter = ScriptedAdapter::new(records.clone(), vec![]);

        let (summary, outcomes) = upgrade_all(&adapter, &records);

        assert!(outcomes.is_empty());
        assert_eq!(summary.status, SourceStatus::Success);
        assert_eq!(summary.updated_count, 0);
    }

    #[test]
    fn mixed_results_are_partial_and_keep_order() {
        let records = vec![record("a", false), record("b", false), record("c", false)];
        let adapter = ScriptedAdapter::new(records.clone(), vec![("b", 1603)]);

        let (summary, outcomes) = upgrade_all(&adapter, &records);

        assert_eq!(summary.status, SourceStatus::Partial);
        assert_eq!(summary.updated_count, 2);
        assert_eq!(summary.errors, vec!["b failed (exit code 1603)".to_string()]);
        assert_eq!(adapter.upgraded(), vec!["a", "b", "c"]);
        assert_eq!(outcomes[1].error_output.as_deref(), Some("output for b"));
        assert!(outcomes[0].error_output.is_none());
        assert_eq!(outcomes[0].from_version, "1.0");
        assert_eq!(outcomes[0].to_version, "2.0");
        assert_eq!(outcomes[0].action, SourceAction::Upgrade);
    }

    #[test]
    fn all_failures_classify_as_error() {
        let records = vec![record("a", false), record("b", false), record("c", false)];
        let adapter = ScriptedAdapter::new(records.clone(), vec![("a", 1), ("b", 2), ("c", 3)]);

        let (summary, outcomes) = upgrade_all(&adapter, &records);

        assert_eq!(summary.status, SourceStatus::Error);
        assert_eq!(summary.updated_count, 0);
        assert_eq!(
            summary.errors,
            vec![
                "a failed (exit code 1)".to_string(),
                "b failed (exit code 2)".to_string(),
                "c failed (exit code 3)".to_string(),
            ]
        );
        assert!(outcomes.iter().all(|outcome| !outcome.success));
    }

    #[test]
    fn adapter_error_becomes_failed_outcome_and_batch_continues() {
        let records = vec![record("spawn-fails", false), record("ok", false)];
        let adapter = ScriptedAdapter::new(records.clone(), vec![]);

        let (summary, outcomes) = upgrade_all(&adapter, &records);

        assert_eq!(summary.status, SourceStatus::Partial);
        assert_eq!(outcomes[0].exit_code, -1);
        assert!(
            outcomes[0]
                .error_output
                .as_deref()
                .unwrap()
                .contains("failed to spawn")
        );
        assert!(outcomes[1].success);
    }

    #[test]
    fn rollback_installs_requested_version() {
        let adapter = ScriptedAdapter::new(vec![], vec![]);

        let outcome = rollback_package(&adapter, "7zip", "22.01", "19.00").unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.from_version, "22.01");
        assert_eq!(outcome.to_version, "19.00");
        assert_eq!(outcome.action, SourceAction::Install);
        assert_eq!(adapter.upgraded(), vec!["7zip@19.00".to_string()]);
    }

    #[test]
    fn rollback_rejects_blank_version() {
        let adapter = ScriptedAdapter::new(vec![], vec![]);
        let error = rollback_package(&adapter, "7zip", "22.01", " ").unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::InvalidInput);
    }
}
