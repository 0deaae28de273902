//! Publish history: one row per `device/next` decision.
//!
//! The table is an audit trail, not working state; it is trimmed to the
//! newest [`HISTORY_KEEP`] rows globally inside the same transaction that
//! inserts, so the cap holds under any interleaving.

use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel::{sql_query, RunQueryDsl};
use serde::Serialize;

use crate::schema::publish_history;

/// Global retention for publish history rows.
pub const HISTORY_KEEP: i64 = 5000;

/// Stored decision row.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = publish_history)]
pub struct PublishRow {
    pub id: i64,
    pub device_id: String,
    pub issued_epoch: i64,
    pub source: String,
    pub image_url: String,
    pub override_id: Option<i64>,
    pub poll_after_seconds: i64,
    pub valid_until_epoch: i64,
}

/// A decision to record.
#[derive(Debug, Insertable)]
#[diesel(table_name = publish_history)]
pub struct NewPublish<'a> {
    pub device_id: &'a str,
    pub issued_epoch: i64,
    pub source: &'a str,
    pub image_url: &'a str,
    pub override_id: Option<i64>,
    pub poll_after_seconds: i64,
    pub valid_until_epoch: i64,
}

/// Append one row and trim the table back to [`HISTORY_KEEP`].
pub fn append_and_trim(conn: &mut SqliteConnection, row: &NewPublish<'_>) -> QueryResult<()> {
    diesel::insert_into(publish_history::table)
        .values(row)
        .execute(conn)?;

    sql_query(
        "DELETE FROM publish_history WHERE id NOT IN \
         (SELECT id FROM publish_history ORDER BY id DESC LIMIT ?)",
    )
    .bind::<BigInt, _>(HISTORY_KEEP)
    .execute(conn)?;
    Ok(())
}

/// Newest rows first, capped at `limit`.
pub fn list_recent(conn: &mut SqliteConnection, limit: i64) -> QueryResult<Vec<PublishRow>> {
    publish_history::table
        .order(publish_history::id.desc())
        .limit(limit)
        .select(PublishRow::as_select())
        .load(conn)
}
