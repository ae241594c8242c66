pub mod chocolatey;
pub mod chocolatey_process;
pub(crate) mod detect_utils;
pub mod manager;
pub(crate) mod process_utils;
pub mod store;
pub mod store_process;
pub mod winget;
pub mod winget_process;

pub use chocolatey::{
    ChocolateyAdapter, ChocolateySource, choco_detect_request, choco_install_version_request,
    choco_outdated_request, choco_upgrade_request,
};
pub use chocolatey_process::ProcessChocolateySource;
pub use manager::{
    AdapterResult, CommandOutcome, EnumerationMode, SourceAdapter, ensure_action_supported,
};
pub use process_utils::NO_EXIT_CODE;
pub use store::{StoreAdapter, StoreSource, store_scan_probe_request, store_scan_request};
pub use store_process::ProcessStoreSource;
pub use winget::{
    WingetAdapter, WingetSource, winget_detect_request, winget_install_version_request,
    winget_list_upgradeable_request, winget_upgrade_request,
};
pub use winget_process::ProcessWingetSource;
