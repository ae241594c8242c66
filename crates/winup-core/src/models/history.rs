use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::UpgradeOutcome;

/// A persisted outcome with the time it was written to the history store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub entry_id: i64,
    pub outcome: UpgradeOutcome,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}
