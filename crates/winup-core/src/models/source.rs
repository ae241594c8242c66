use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Winget,
    Chocolatey,
    Store,
}

impl SourceId {
    /// Sources in the order a full run visits them.
    pub const ALL: [SourceId; 3] = [Self::Winget, Self::Chocolatey, Self::Store];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Winget => "winget",
            Self::Chocolatey => "chocolatey",
            Self::Store => "store",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for SourceId {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "winget" => Ok(Self::Winget),
            "chocolatey" | "choco" => Ok(Self::Chocolatey),
            "store" | "msstore" => Ok(Self::Store),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Capability {
    Detect,
    ListOutdated,
    Upgrade,
    Install,
    Scan,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAction {
    Detect,
    ListOutdated,
    Upgrade,
    Install,
    Scan,
}

impl SourceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::ListOutdated => "list_outdated",
            Self::Upgrade => "upgrade",
            Self::Install => "install",
            Self::Scan => "scan",
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            Self::Detect => Capability::Detect,
            Self::ListOutdated => Capability::ListOutdated,
            Self::Upgrade => Capability::Upgrade,
            Self::Install => Capability::Install,
            Self::Scan => Capability::Scan,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceDescriptor {
    pub id: SourceId,
    pub display_name: &'static str,
    pub capabilities: &'static [Capability],
}

impl SourceDescriptor {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DetectionInfo {
    pub installed: bool,
    pub executable_path: Option<PathBuf>,
    pub version: Option<String>,
}
