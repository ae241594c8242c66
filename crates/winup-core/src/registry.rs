use std::sync::Arc;

use crate::adapters::chocolatey::CHOCOLATEY_DESCRIPTOR;
use crate::adapters::store::STORE_DESCRIPTOR;
use crate::adapters::winget::WINGET_DESCRIPTOR;
use crate::adapters::{
    ChocolateyAdapter, ProcessChocolateySource, ProcessStoreSource, ProcessWingetSource,
    SourceAdapter, StoreAdapter, WingetAdapter,
};
use crate::config::ExecutionConfig;
use crate::execution::ProcessExecutor;
use crate::models::{SourceDescriptor, SourceId};

const ALL_SOURCES: [SourceDescriptor; 3] =
    [WINGET_DESCRIPTOR, CHOCOLATEY_DESCRIPTOR, STORE_DESCRIPTOR];

/// Descriptors in run order.
pub fn sources() -> &'static [SourceDescriptor] {
    &ALL_SOURCES
}

pub fn source(id: SourceId) -> Option<&'static SourceDescriptor> {
    ALL_SOURCES.iter().find(|descriptor| descriptor.id == id)
}

/// Builds the process-backed adapter for one source.
pub fn process_adapter(
    id: SourceId,
    executor: Arc<dyn ProcessExecutor>,
    execution: &ExecutionConfig,
) -> Arc<dyn SourceAdapter> {
    let list_timeout = execution.list_timeout();
    let upgrade_timeout = execution.upgrade_timeout();

    match id {
        SourceId::Winget => Arc::new(WingetAdapter::new(
            ProcessWingetSource::new(executor).with_timeouts(list_timeout, upgrade_timeout),
        )),
        SourceId::Chocolatey => Arc::new(ChocolateyAdapter::new(
            ProcessChocolateySource::new(executor).with_timeouts(list_timeout, upgrade_timeout),
        )),
        SourceId::Store => Arc::new(StoreAdapter::new(
            ProcessStoreSource::new(executor).with_timeouts(list_timeout, upgrade_timeout),
        )),
    }
}

/// Process-backed adapters for every source, in run order.
pub fn process_adapters(
    executor: Arc<dyn ProcessExecutor>,
    execution: &ExecutionConfig,
) -> Vec<Arc<dyn SourceAdapter>> {
    sources()
        .iter()
        .map(|descriptor| process_adapter(descriptor.id, executor.clone(), execution))
        .collect()
}
