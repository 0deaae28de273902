//! Schema setup: embedded migrations plus the additive column pass.
//!
//! The embedded migration creates the full schema for fresh database files.
//! [`ensure_additive_columns`] upgrades older files in place: for each column
//! the current code expects, if the live table lacks it, an `ALTER TABLE ..
//! ADD COLUMN` with the column's default is issued. Columns are never dropped
//! or rewritten, so a database file is always safe to reopen across versions.

use anyhow::anyhow;
use diesel::sql_types::Text;
use diesel::{QueryableByName, RunQueryDsl, SqliteConnection, sql_query};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::db::connection::connect_sqlite;

/// Embedded Diesel migrations bundled with this crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Expected columns that older database files may lack, with the DDL used to
/// add them. Battery telemetry and the reported-config snapshot arrived after
/// the first deployments.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("devices", "battery_mv", "battery_mv INTEGER NOT NULL DEFAULT 0"),
    (
        "devices",
        "battery_percent",
        "battery_percent INTEGER NOT NULL DEFAULT -1",
    ),
    ("devices", "charging", "charging INTEGER NOT NULL DEFAULT -1"),
    ("devices", "vbus_good", "vbus_good INTEGER NOT NULL DEFAULT -1"),
    (
        "devices",
        "reported_config_json",
        "reported_config_json TEXT NOT NULL DEFAULT ''",
    ),
    (
        "devices",
        "reported_config_epoch",
        "reported_config_epoch BIGINT NOT NULL DEFAULT 0",
    ),
];

#[derive(QueryableByName)]
struct ColumnInfo {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Runs pending migrations and the additive column pass on the database at
/// the given path.
pub fn run_sqlite(url: &str) -> anyhow::Result<()> {
    let mut conn = connect_sqlite(url)?;

    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!(e))?;

    ensure_additive_columns(&mut conn)?;
    Ok(())
}

/// Add any expected-but-missing column to a live table.
pub fn ensure_additive_columns(conn: &mut SqliteConnection) -> anyhow::Result<()> {
    for (table, column, ddl) in ADDITIVE_COLUMNS {
        let present: Vec<ColumnInfo> =
            sql_query(format!("PRAGMA table_info({table});")).load(conn)?;
        if present.iter().any(|c| c.name == *column) {
            continue;
        }
        tracing::info!(table, column, "adding missing column");
        sql_query(format!("ALTER TABLE {table} ADD COLUMN {ddl};")).execute(conn)?;
    }
    Ok(())
}
