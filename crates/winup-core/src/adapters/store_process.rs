use std::sync::Arc;
use std::time::Duration;

use crate::adapters::detect_utils::{source_bin_roots, which_executable};
use crate::adapters::manager::{AdapterResult, CommandOutcome};
use crate::adapters::process_utils::{
    run_and_collect_listing, run_and_collect_outcome, run_and_collect_version_output,
};
use crate::adapters::store::{
    MSSTORE_CATALOG, StoreDetectOutput, StoreSource, store_scan_probe_request, store_scan_request,
};
use crate::adapters::winget::{
    LIST_TIMEOUT, WINGET_COMMAND, winget_detect_request, winget_list_upgradeable_request,
    winget_upgrade_request,
};
use crate::execution::{ProcessExecutor, ProcessSpawnRequest};
use crate::models::SourceId;

pub struct ProcessStoreSource {
    executor: Arc<dyn ProcessExecutor>,
    list_timeout: Duration,
    upgrade_timeout: Option<Duration>,
}

impl ProcessStoreSource {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            executor,
            list_timeout: LIST_TIMEOUT,
            upgrade_timeout: None,
        }
    }

    pub fn with_timeouts(
        mut self,
        list_timeout: Duration,
        upgrade_timeout: Option<Duration>,
    ) -> Self {
        self.list_timeout = list_timeout;
        self.upgrade_timeout = upgrade_timeout;
        self
    }

    fn configure_request(&self, mut request: ProcessSpawnRequest) -> ProcessSpawnRequest {
        // Store requests reuse winget's request builders, tagged with the Store source.
        request.source = SourceId::Store;

        if request.command.program.to_str() == Some(WINGET_COMMAND)
            && let Some(exe) = which_executable(
                self.executor.as_ref(),
                WINGET_COMMAND,
                &source_bin_roots(SourceId::Store),
                SourceId::Store,
            )
        {
            request.command.program = exe;
        }

        request
    }
}

impl StoreSource for ProcessStoreSource {
    fn detect(&self) -> AdapterResult<StoreDetectOutput> {
        let winget_path = which_executable(
            self.executor.as_ref(),
            WINGET_COMMAND,
            &source_bin_roots(SourceId::Store),
            SourceId::Store,
        );

        let request = self.configure_request(winget_detect_request());
        let winget_version_output = run_and_collect_version_output(self.executor.as_ref(), request);

        // The MDM probe starts PowerShell; only pay for it when winget is absent.
        let scan_class_available = if winget_path.is_none() && winget_version_output.is_empty() {
            run_and_collect_outcome(self.executor.as_ref(), store_scan_probe_request())
                .map(|outcome| outcome.succeeded())
                .unwrap_or(false)
        } else {
            false
        };

        Ok(StoreDetectOutput {
            winget_path,
            winget_version_output,
            scan_class_available,
        })
    }

    fn list_upgradeable(&self) -> AdapterResult<String> {
        let request = self.configure_request(winget_list_upgradeable_request(
            SourceId::Store,
            MSSTORE_CATALOG,
            self.list_timeout,
        ));
        run_and_collect_listing(self.executor.as_ref(), request)
    }

    fn upgrade(&self, package_id: &str) -> AdapterResult<CommandOutcome> {
        let request = self.configure_request(winget_upgrade_request(
            SourceId::Store,
            MSSTORE_CATALOG,
            package_id,
            self.upgrade_timeout,
        ));
        run_and_collect_outcome(self.executor.as_ref(), request)
    }

    fn trigger_scan(&self) -> AdapterResult<CommandOutcome> {
        run_and_collect_outcome(self.executor.as_ref(), store_scan_request())
    }
}
