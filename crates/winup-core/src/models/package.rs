use serde::{Deserialize, Serialize};

/// One upgradeable unit reported by a package source.
///
/// Versions are kept as the tool printed them; Windows installers use too
/// many schemes for a semantic comparison to be meaningful.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub id: String,
    pub current_version: String,
    pub available_version: String,
    pub pinned: bool,
}
