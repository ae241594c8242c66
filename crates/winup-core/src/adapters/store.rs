use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::adapters::manager::{AdapterResult, CommandOutcome, EnumerationMode, SourceAdapter};
use crate::adapters::winget::parse_winget_upgrade_table;
use crate::execution::{CommandSpec, ProcessSpawnRequest};
use crate::models::{
    Capability, CoreError, CoreErrorKind, DetectionInfo, PackageRecord, SourceAction,
    SourceDescriptor, SourceId,
};

const STORE_CAPABILITIES: &[Capability] = &[
    Capability::Detect,
    Capability::ListOutdated,
    Capability::Upgrade,
    Capability::Scan,
];

pub(crate) const STORE_DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: SourceId::Store,
    display_name: "Microsoft Store",
    capabilities: STORE_CAPABILITIES,
};

pub(crate) const POWERSHELL_COMMAND: &str = "powershell.exe";
pub(crate) const MSSTORE_CATALOG: &str = "msstore";
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const SCAN_TIMEOUT: Duration = Duration::from_secs(300);

const MDM_NAMESPACE: &str = r"root\cimv2\mdm\dmmap";
const MDM_APP_MANAGEMENT_CLASS: &str = "MDM_EnterpriseModernAppManagement_AppManagement01";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreDetectOutput {
    pub winget_path: Option<PathBuf>,
    pub winget_version_output: String,
    pub scan_class_available: bool,
}

/// How Store updates are reached on this host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StoreBackend {
    /// Winget's `msstore` catalog lists and upgrades individual apps.
    Winget,
    /// Only the MDM app-management scan can be triggered.
    MdmScan,
    Missing,
}

pub trait StoreSource: Send + Sync {
    fn detect(&self) -> AdapterResult<StoreDetectOutput>;
    fn list_upgradeable(&self) -> AdapterResult<String>;
    fn upgrade(&self, package_id: &str) -> AdapterResult<CommandOutcome>;
    fn trigger_scan(&self) -> AdapterResult<CommandOutcome>;
}

pub struct StoreAdapter<S: StoreSource> {
    source: S,
    backend: OnceLock<StoreBackend>,
}

impl<S: StoreSource> StoreAdapter<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            backend: OnceLock::new(),
        }
    }

    fn backend(&self) -> StoreBackend {
        if let Some(backend) = self.backend.get() {
            return *backend;
        }
        match self.source.detect() {
            Ok(output) => *self.backend.get_or_init(|| backend_for(&output)),
            Err(_) => StoreBackend::Missing,
        }
    }

    fn require_winget(&self, action: SourceAction) -> AdapterResult<()> {
        if self.backend() == StoreBackend::Winget {
            return Ok(());
        }
        Err(CoreError::new(
            Some(SourceId::Store),
            Some(action),
            CoreErrorKind::UnsupportedCapability,
            "per-package Store updates require winget's msstore source",
        ))
    }
}

impl<S: StoreSource> SourceAdapter for StoreAdapter<S> {
    fn descriptor(&self) -> &SourceDescriptor {
        &STORE_DESCRIPTOR
    }

    fn detect(&self) -> AdapterResult<DetectionInfo> {
        let output = self.source.detect()?;
        let backend = *self.backend.get_or_init(|| backend_for(&output));
        let version = match backend {
            StoreBackend::Winget => output
                .winget_version_output
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(|line| line.trim_start_matches('v').to_owned()),
            StoreBackend::MdmScan | StoreBackend::Missing => None,
        };

        Ok(DetectionInfo {
            installed: backend != StoreBackend::Missing,
            executable_path: output.winget_path,
            version,
        })
    }

    fn enumeration_mode(&self) -> EnumerationMode {
        match self.backend() {
            StoreBackend::Winget => EnumerationMode::PerPackage,
            StoreBackend::MdmScan | StoreBackend::Missing => EnumerationMode::ScanOnly,
        }
    }

    fn list_upgradeable(&self) -> AdapterResult<Vec<PackageRecord>> {
        self.require_winget(SourceAction::ListOutdated)?;
        let raw = self.source.list_upgradeable()?;
        Ok(parse_winget_upgrade_table(&raw))
    }

    fn upgrade_one(&self, package_id: &str) -> AdapterResult<CommandOutcome> {
        self.require_winget(SourceAction::Upgrade)?;
        self.source.upgrade(package_id)
    }

    fn trigger_scan(&self) -> AdapterResult<()> {
        let outcome = self.source.trigger_scan()?;
        if outcome.succeeded() {
            return Ok(());
        }
        Err(CoreError::new(
            Some(SourceId::Store),
            Some(SourceAction::Scan),
            CoreErrorKind::ProcessFailure,
            format!(
                "store update scan exited with code {}: {}",
                outcome.exit_code,
                outcome.output.trim()
            ),
        ))
    }
}

fn backend_for(output: &StoreDetectOutput) -> StoreBackend {
    let winget_present = output.winget_path.is_some()
        || output
            .winget_version_output
            .trim()
            .trim_start_matches('v')
            .starts_with(|ch: char| ch.is_ascii_digit());

    if winget_present {
        StoreBackend::Winget
    } else if output.scan_class_available {
        StoreBackend::MdmScan
    } else {
        StoreBackend::Missing
    }
}

fn powershell_request(
    action: SourceAction,
    script: String,
    timeout: Duration,
) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        SourceId::Store,
        action,
        CommandSpec::new(POWERSHELL_COMMAND)
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(script),
    )
    .timeout(timeout)
}

/// Exits 0 only when the MDM app-management class can be read (needs elevation).
pub fn store_scan_probe_request() -> ProcessSpawnRequest {
    powershell_request(
        SourceAction::Detect,
        format!(
            "Get-CimClass -Namespace '{MDM_NAMESPACE}' -ClassName '{MDM_APP_MANAGEMENT_CLASS}' -ErrorAction Stop | Out-Null"
        ),
        PROBE_TIMEOUT,
    )
}

pub fn store_scan_request() -> ProcessSpawnRequest {
    powershell_request(
        SourceAction::Scan,
        format!(
            "Get-CimInstance -Namespace '{MDM_NAMESPACE}' -ClassName '{MDM_APP_MANAGEMENT_CLASS}' -ErrorAction Stop | Invoke-CimMethod -MethodName UpdateScanMethod -ErrorAction Stop | Out-Null"
        ),
        SCAN_TIMEOUT,
    )
}
