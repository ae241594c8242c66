use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, Row, params};
use time::OffsetDateTime;

use crate::models::{CoreError, CoreErrorKind, HistoryEntry, SourceAction, SourceId, UpgradeOutcome};
use crate::persistence::{HistoryStore, MigrationStore, PersistenceResult};
use crate::sqlite::migrations::{SqliteMigration, current_schema_version, migration};

const MIGRATIONS_TABLE: &str = "winup_schema_migrations";

const HISTORY_COLUMNS: &str = "entry_id, source_id, package_id, from_version, to_version, \
     success, exit_code, duration_seconds, error_output, started_at_unix, recorded_at_unix, \
     action";

pub struct SqliteStore {
    database_path: PathBuf,
}

impl SqliteStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn migrate_to_latest(&self) -> PersistenceResult<()> {
        self.apply_migration(current_schema_version())
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let mut connection = open_connection(&self.database_path)
            .map_err(|error| storage_error(operation_name, error))?;
        operation(&mut connection).map_err(|error| storage_error(operation_name, error))
    }
}

impl MigrationStore for SqliteStore {
    fn current_version(&self) -> PersistenceResult<i64> {
        self.with_connection("current_version", |connection| {
            ensure_migrations_table(connection)?;
            read_current_version(connection)
        })
    }

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()> {
        if target_version < 0 || target_version > current_schema_version() {
            return Err(storage_error_text(
                "apply_migration",
                format!("invalid migration target version '{target_version}'"),
            ));
        }

        if target_version > 0 && migration(target_version).is_none() {
            return Err(storage_error_text(
                "apply_migration",
                format!("migration version '{target_version}' is not defined"),
            ));
        }

        self.with_connection("apply_migration", |connection| {
            ensure_migrations_table(connection)?;
            let current_version = read_current_version(connection)?;

            if target_version == current_version {
                // Recorded versions can outlive dropped tables. CREATE statements
                // are IF NOT EXISTS; re-adding an existing column is tolerated.
                for version in 1..=target_version {
                    execute_batch_tolerant(connection, defined_migration(version)?.up_sql)?;
                }
                return Ok(());
            }

            if target_version > current_version {
                for version in (current_version + 1)..=target_version {
                    apply_up_migration(connection, defined_migration(version)?)?;
                }
            } else {
                for version in ((target_version + 1)..=current_version).rev() {
                    apply_down_migration(connection, defined_migration(version)?)?;
                }
            }

            Ok(())
        })
    }
}

impl HistoryStore for SqliteStore {
    fn append_outcomes(&self, outcomes: &[UpgradeOutcome]) -> PersistenceResult<()> {
        if outcomes.is_empty() {
            return Ok(());
        }

        let recorded_at_unix = OffsetDateTime::now_utc().unix_timestamp();
        self.with_connection("append_outcomes", |connection| {
            ensure_schema_ready(connection)?;
            let transaction = connection.transaction()?;
            {
                let mut statement = transaction.prepare(
                    "
INSERT INTO upgrade_history (
    source_id, package_id, from_version, to_version, success, exit_code,
    duration_seconds, error_output, started_at_unix, recorded_at_unix, action
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
",
                )?;

                for outcome in outcomes {
                    statement.execute(params![
                        outcome.source.as_str(),
                        outcome.package_id.as_str(),
                        outcome.from_version.as_str(),
                        outcome.to_version.as_str(),
                        bool_to_sqlite(outcome.success),
                        outcome.exit_code,
                        outcome.duration_seconds,
                        outcome.error_output.as_deref(),
                        outcome.started_at.unix_timestamp(),
                        recorded_at_unix,
                        outcome.action.as_str(),
                    ])?;
                }
            }
            transaction.commit()?;
            Ok(())
        })
    }

    fn recent(&self, limit: usize) -> PersistenceResult<Vec<HistoryEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.with_connection("recent", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM upgrade_history ORDER BY entry_id DESC LIMIT ?1"
            ))?;
            let rows = statement.query_map(params![to_i64(limit)?], history_entry_from_row)?;
            rows.collect()
        })
    }

    fn last_successful_upgrade(
        &self,
        source: SourceId,
        package_id: &str,
    ) -> PersistenceResult<Option<HistoryEntry>> {
        self.with_connection("last_successful_upgrade", |connection| {
            ensure_schema_ready(connection)?;
            connection
                .query_row(
                    &format!(
                        "SELECT {HISTORY_COLUMNS} FROM upgrade_history
                         WHERE source_id = ?1 AND package_id = ?2 COLLATE NOCASE
                           AND success = 1 AND action = ?3
                         ORDER BY entry_id DESC LIMIT 1"
                    ),
                    params![source.as_str(), package_id, SourceAction::Upgrade.as_str()],
                    history_entry_from_row,
                )
                .optional()
        })
    }
}

fn history_entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let source_raw: String = row.get(1)?;
    let started_at_unix: i64 = row.get(9)?;
    let recorded_at_unix: i64 = row.get(10)?;
    let action_raw: String = row.get(11)?;

    Ok(HistoryEntry {
        entry_id: row.get(0)?,
        outcome: UpgradeOutcome {
            source: parse_source_id(&source_raw)?,
            action: parse_action(&action_raw)?,
            package_id: row.get(2)?,
            from_version: row.get(3)?,
            to_version: row.get(4)?,
            success: sqlite_to_bool(row.get(5)?),
            exit_code: row.get(6)?,
            duration_seconds: row.get(7)?,
            error_output: row.get(8)?,
            started_at: from_unix_seconds(started_at_unix)?,
        },
        recorded_at: from_unix_seconds(recorded_at_unix)?,
    })
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
    }
    Connection::open(database_path)
}

fn ensure_migrations_table(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(&format!(
        "
CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at_unix INTEGER NOT NULL
);
"
    ))
}

fn ensure_schema_ready(connection: &Connection) -> rusqlite::Result<()> {
    ensure_migrations_table(connection)?;
    let version = read_current_version(connection)?;
    if version <= 0 {
        return Err(storage_error_sqlite(
            "database schema is not initialized; apply migrations before history operations",
        ));
    }
    Ok(())
}

fn read_current_version(connection: &Connection) -> rusqlite::Result<i64> {
    connection.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    )
}

fn defined_migration(version: i64) -> rusqlite::Result<&'static SqliteMigration> {
    migration(version).ok_or_else(|| {
        storage_error_sqlite(&format!("migration version '{version}' is not defined"))
    })
}

fn execute_batch_tolerant(connection: &Connection, sql: &str) -> rusqlite::Result<()> {
    match connection.execute_batch(sql) {
        Ok(()) => Ok(()),
        Err(error) if error.to_string().contains("duplicate column name") => Ok(()),
        Err(error) => Err(error),
    }
}

fn apply_up_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(migration.up_sql)?;
    transaction.execute(
        &format!(
            "INSERT INTO {MIGRATIONS_TABLE} (version, name, applied_at_unix)
             VALUES (?1, ?2, ?3)"
        ),
        (
            migration.version,
            migration.name,
            OffsetDateTime::now_utc().unix_timestamp(),
        ),
    )?;
    transaction.commit()
}

fn apply_down_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(migration.down_sql)?;
    transaction.execute(
        &format!("DELETE FROM {MIGRATIONS_TABLE} WHERE version = ?1"),
        [migration.version],
    )?;
    transaction.commit()
}

fn storage_error(operation: &str, error: rusqlite::Error) -> CoreError {
    storage_error_text(operation, error.to_string())
}

fn storage_error_sqlite(message: &str) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(message.to_string())))
}

fn parse_source_id(raw: &str) -> rusqlite::Result<SourceId> {
    raw.parse::<SourceId>().map_err(|_| {
        storage_error_sqlite(&format!(
            "unknown source id '{raw}' found in persisted sqlite record"
        ))
    })
}

fn parse_action(raw: &str) -> rusqlite::Result<SourceAction> {
    match raw {
        "upgrade" => Ok(SourceAction::Upgrade),
        "install" => Ok(SourceAction::Install),
        _ => Err(storage_error_sqlite(&format!(
            "unknown outcome action '{raw}' found in persisted sqlite record"
        ))),
    }
}

fn bool_to_sqlite(value: bool) -> i64 {
    if value { 1 } else { 0 }
}

fn sqlite_to_bool(value: i64) -> bool {
    value != 0
}

fn from_unix_seconds(value: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(value).map_err(|error| {
        storage_error_sqlite(&format!("invalid unix timestamp '{value}': {error}"))
    })
}

fn to_i64(value: usize) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|_| storage_error_sqlite("value exceeds i64 range"))
}

fn storage_error_text(operation: &str, message: impl AsRef<str>) -> CoreError {
    CoreError::new(
        None,
        None,
        CoreErrorKind::StorageFailure,
        format!("sqlite store '{operation}' failed: {}", message.as_ref()),
    )
}
