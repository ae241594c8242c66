use crate::models::{CoreError, HistoryEntry, SourceId, UpgradeOutcome};

pub type PersistenceResult<T> = Result<T, CoreError>;

pub trait MigrationStore: Send + Sync {
    fn current_version(&self) -> PersistenceResult<i64>;

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()>;
}

/// Append-only record of upgrade and rollback outcomes.
pub trait HistoryStore: Send + Sync {
    fn append_outcomes(&self, outcomes: &[UpgradeOutcome]) -> PersistenceResult<()>;

    /// Newest first.
    fn recent(&self, limit: usize) -> PersistenceResult<Vec<HistoryEntry>>;

    /// Most recent successful pipeline upgrade; rollbacks are not considered.
    fn last_successful_upgrade(
        &self,
        source: SourceId,
        package_id: &str,
    ) -> PersistenceResult<Option<HistoryEntry>>;
}
