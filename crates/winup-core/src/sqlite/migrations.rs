#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "initial_upgrade_history",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS upgrade_history (
    entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL,
    package_id TEXT NOT NULL,
    from_version TEXT NOT NULL,
    to_version TEXT NOT NULL,
    success INTEGER NOT NULL,
    exit_code INTEGER NOT NULL,
    duration_seconds REAL NOT NULL,
    error_output TEXT,
    started_at_unix INTEGER NOT NULL,
    recorded_at_unix INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_upgrade_history_recorded
    ON upgrade_history (recorded_at_unix DESC, entry_id DESC);
"#,
    down_sql: r#"
DROP INDEX IF EXISTS idx_upgrade_history_recorded;
DROP TABLE IF EXISTS upgrade_history;
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "index_history_by_package",
    up_sql: r#"
CREATE INDEX IF NOT EXISTS idx_upgrade_history_package
    ON upgrade_history (source_id, package_id, success, entry_id DESC);
"#,
    down_sql: r#"
DROP INDEX IF EXISTS idx_upgrade_history_package;
"#,
};

// Rows written before this migration were all pipeline upgrades.
const MIGRATION_0003: SqliteMigration = SqliteMigration {
    version: 3,
    name: "history_outcome_action",
    up_sql: r#"
ALTER TABLE upgrade_history ADD COLUMN action TEXT NOT NULL DEFAULT 'upgrade';
"#,
    down_sql: r#"
ALTER TABLE upgrade_history DROP COLUMN action;
"#,
};

const MIGRATIONS: [SqliteMigration; 3] = [MIGRATION_0001, MIGRATION_0002, MIGRATION_0003];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SqliteMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}
