use std::sync::Arc;
use std::time::Duration;

use crate::adapters::detect_utils::{source_bin_roots, which_executable};
use crate::adapters::manager::{AdapterResult, CommandOutcome};
use crate::adapters::process_utils::{
    run_and_collect_listing, run_and_collect_outcome, run_and_collect_version_output,
};
use crate::adapters::winget::{
    LIST_TIMEOUT, WINGET_COMMAND, WingetDetectOutput, WingetSource, winget_detect_request,
    winget_install_version_request, winget_list_upgradeable_request, winget_upgrade_request,
};
use crate::execution::{ProcessExecutor, ProcessSpawnRequest};
use crate::models::SourceId;

pub(crate) const WINGET_CATALOG: &str = "winget";

pub struct ProcessWingetSource {
    executor: Arc<dyn ProcessExecutor>,
    list_timeout: Duration,
    upgrade_timeout: Option<Duration>,
}

impl ProcessWingetSource {
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
        if request.command.program.to_str() == Some(WINGET_COMMAND)
            && let Some(exe) = which_executable(
                self.executor.as_ref(),
                WINGET_COMMAND,
                &source_bin_roots(SourceId::Winget),
                SourceId::Winget,
            )
        {
            request.command.program = exe;
        }

        request
    }
}

impl WingetSource for ProcessWingetSource {
    fn detect(&self) -> AdapterResult<WingetDetectOutput> {
        let executable_path = which_executable(
            self.executor.as_ref(),
            WINGET_COMMAND,
            &source_bin_roots(SourceId::Winget),
            SourceId::Winget,
        );

        let request = self.configure_request(winget_detect_request());
        let version_output = run_and_collect_version_output(self.executor.as_ref(), request);

        Ok(WingetDetectOutput {
            executable_path,
            version_output,
        })
    }

    fn list_upgradeable(&self) -> AdapterResult<String> {
        let request = self.configure_request(winget_list_upgradeable_request(
            SourceId::Winget,
            WINGET_CATALOG,
            self.list_timeout,
        ));
        run_and_collect_listing(self.executor.as_ref(), request)
    }

    fn upgrade(&self, package_id: &str) -> AdapterResult<CommandOutcome> {
        let request = self.configure_request(winget_upgrade_request(
            SourceId::Winget,
            WINGET_CATALOG,
            package_id,
            self.upgrade_timeout,
        ));
        run_and_collect_outcome(self.executor.as_ref(), request)
    }

    fn install_version(&self, package_id: &str, version: &str) -> AdapterResult<CommandOutcome> {
        let request = self.configure_request(winget_install_version_request(
            package_id,
            version,
            self.upgrade_timeout,
        ));
        run_and_collect_outcome(self.executor.as_ref(), request)
    }
}
