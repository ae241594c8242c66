use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::manager::{AdapterResult, CommandOutcome, SourceAdapter};
use crate::execution::{CommandSpec, ProcessSpawnRequest};
use crate::models::{
    Capability, DetectionInfo, PackageRecord, SourceAction, SourceDescriptor, SourceId,
};

const CHOCOLATEY_CAPABILITIES: &[Capability] = &[
    Capability::Detect,
    Capability::ListOutdated,
    Capability::Upgrade,
    Capability::Install,
];

pub(crate) const CHOCOLATEY_DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: SourceId::Chocolatey,
    display_name: "Chocolatey",
    capabilities: CHOCOLATEY_CAPABILITIES,
};

pub(crate) const CHOCO_COMMAND: &str = "choco";
pub(crate) const DETECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const LIST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChocolateyDetectOutput {
    pub executable_path: Option<PathBuf>,
    pub version_output: String,
}

pub trait ChocolateySource: Send + Sync {
    fn detect(&self) -> AdapterResult<ChocolateyDetectOutput>;
    fn list_outdated(&self) -> AdapterResult<String>;
    fn upgrade(&self, package_id: &str) -> AdapterResult<CommandOutcome>;
    fn install_version(&self, package_id: &str, version: &str) -> AdapterResult<CommandOutcome>;
}

pub struct ChocolateyAdapter<S: ChocolateySource> {
    source: S,
}

impl<S: ChocolateySource> ChocolateyAdapter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: ChocolateySource> SourceAdapter for ChocolateyAdapter<S> {
    fn descriptor(&self) -> &SourceDescriptor {
        &CHOCOLATEY_DESCRIPTOR
    }

    fn detect(&self) -> AdapterResult<DetectionInfo> {
        let output = self.source.detect()?;
        let version = parse_choco_version(&output.version_output);
        let installed = output.executable_path.is_some() || version.is_some();
        Ok(DetectionInfo {
            installed,
            executable_path: output.executable_path,
            version,
        })
    }

    fn list_upgradeable(&self) -> AdapterResult<Vec<PackageRecord>> {
        let raw = self.source.list_outdated()?;
        Ok(parse_choco_outdated(&raw))
    }

    fn upgrade_one(&self, package_id: &str) -> AdapterResult<CommandOutcome> {
        self.source.upgrade(package_id)
    }

    fn install_version(&self, package_id: &str, version: &str) -> AdapterResult<CommandOutcome> {
        self.source.install_version(package_id, version)
    }
}

pub fn choco_detect_request() -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        SourceId::Chocolatey,
        SourceAction::Detect,
        CommandSpec::new(CHOCO_COMMAND).arg("--version"),
    )
    .timeout(DETECT_TIMEOUT)
}

/// `--limit-output` switches choco to `name|current|available|pinned` lines.
pub fn choco_outdated_request(timeout: Duration) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        SourceId::Chocolatey,
        SourceAction::ListOutdated,
        CommandSpec::new(CHOCO_COMMAND).args(["outdated", "--limit-output"]),
    )
    .timeout(timeout)
}

/// choco package ids are matched exactly by design; no extra flag is needed.
pub fn choco_upgrade_request(package_id: &str, timeout: Option<Duration>) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        SourceId::Chocolatey,
        SourceAction::Upgrade,
        CommandSpec::new(CHOCO_COMMAND)
            .args(["upgrade", package_id])
            .args(["--yes", "--no-progress", "--limit-output"]),
    )
    .maybe_timeout(timeout)
}

pub fn choco_install_version_request(
    package_id: &str,
    version: &str,
    timeout: Option<Duration>,
) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        SourceId::Chocolatey,
        SourceAction::Install,
        CommandSpec::new(CHOCO_COMMAND)
            .args(["upgrade", package_id, "--version", version])
            .args(["--allow-downgrade", "--yes", "--no-progress", "--limit-output"]),
    )
    .maybe_timeout(timeout)
}

fn parse_choco_version(output: &str) -> Option<String> {
    // `choco --version` prints just the version, e.g. "2.2.2"
    let line = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    let version = line.split_whitespace().next()?;
    version
        .chars()
        .next()
        .filter(char::is_ascii_digit)
        .map(|_| version.to_owned())
}

/// Parses `choco outdated --limit-output`. Lines with fewer than three fields
/// or a blank name are dropped without error.
pub(crate) fn parse_choco_outdated(output: &str) -> Vec<PackageRecord> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(parse_choco_line)
        .collect()
}

fn parse_choco_line(line: &str) -> Option<PackageRecord> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < 3 {
        return None;
    }

    let name = fields[0].trim();
    if name.is_empty() {
        return None;
    }

    let pinned = fields
        .get(3)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));

    Some(PackageRecord {
        name: name.to_string(),
        id: name.to_string(),
        current_version: fields[1].trim().to_string(),
        available_version: fields[2].trim().to_string(),
        pinned,
    })
}
