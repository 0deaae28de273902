//! Config plans and per-device apply status.
//!
//! A plan row's id IS its version: SQLite hands out strictly increasing ids,
//! which gives devices a monotonic "is this newer than what I run" check for
//! free. Plans target one device or `*`; resolution prefers the most recent
//! plan, breaking recency ties in favor of the exact device.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel::{sql_query, RunQueryDsl};
use serde::Serialize;

use crate::schema::{device_config_plans as plans, device_config_status as status};

/// Per-device retention for plan rows.
pub const PLANS_KEEP_PER_DEVICE: i64 = 200;

/// Longest apply-error string kept per device.
pub const APPLY_ERROR_MAX_CHARS: usize = 512;

/// Stored plan row.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = plans)]
pub struct PlanRow {
    pub id: i64,
    pub device_id: String,
    pub config_json: String,
    pub note: String,
    pub created_epoch: i64,
}

/// Stored apply-status row.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = status)]
pub struct StatusRow {
    pub device_id: String,
    pub last_query_epoch: i64,
    pub last_seen_version: i64,
    pub target_version: i64,
    pub last_apply_epoch: i64,
    pub applied_version: i64,
    pub apply_ok: bool,
    pub apply_error: String,
}

/// Insert a plan for `device` and trim that device's plans to
/// [`PLANS_KEEP_PER_DEVICE`]. Returns the new plan id (= version).
pub fn insert_plan(
    conn: &mut SqliteConnection,
    device: &str,
    config_json: &str,
    note: &str,
    now: i64,
) -> QueryResult<i64> {
    let id: i64 = diesel::insert_into(plans::table)
        .values((
            plans::device_id.eq(device),
            plans::config_json.eq(config_json),
            plans::note.eq(note),
            plans::created_epoch.eq(now),
        ))
        .returning(plans::id)
        .get_result(conn)?;

    sql_query(
        "DELETE FROM device_config_plans WHERE device_id = ? AND id NOT IN \
         (SELECT id FROM device_config_plans WHERE device_id = ? ORDER BY id DESC LIMIT ?)",
    )
    .bind::<Text, _>(device)
    .bind::<Text, _>(device)
    .bind::<BigInt, _>(PLANS_KEEP_PER_DEVICE)
    .execute(conn)?;

    Ok(id)
}

/// The plan `device` should currently be running, if any.
pub fn resolve_for(conn: &mut SqliteConnection, device: &str) -> QueryResult<Option<PlanRow>> {
    plans::table
        .filter(plans::device_id.eq(device).or(plans::device_id.eq("*")))
        .order((
            plans::created_epoch.desc(),
            plans::device_id.eq(device).desc(),
            plans::id.desc(),
        ))
        .select(PlanRow::as_select())
        .first(conn)
        .optional()
}

/// Record that `device` asked for its config.
pub fn record_query(
    conn: &mut SqliteConnection,
    device: &str,
    now: i64,
    seen_version: i64,
    target_version: i64,
) -> QueryResult<usize> {
    diesel::insert_into(status::table)
        .values((
            status::device_id.eq(device),
            status::last_query_epoch.eq(now),
            status::last_seen_version.eq(seen_version),
            status::target_version.eq(target_version),
        ))
        .on_conflict(status::device_id)
        .do_update()
        .set((
            status::last_query_epoch.eq(now),
            status::last_seen_version.eq(seen_version),
            status::target_version.eq(target_version),
        ))
        .execute(conn)
}

/// Record a device's apply attempt for a version.
pub fn record_applied(
    conn: &mut SqliteConnection,
    device: &str,
    apply_epoch: i64,
    version: i64,
    ok: bool,
    error: &str,
) -> QueryResult<usize> {
    let error: String = error.chars().take(APPLY_ERROR_MAX_CHARS).collect();
    diesel::insert_into(status::table)
        .values((
            status::device_id.eq(device),
            status::last_apply_epoch.eq(apply_epoch),
            status::applied_version.eq(version),
            status::apply_ok.eq(ok),
            status::apply_error.eq(&error),
        ))
        .on_conflict(status::device_id)
        .do_update()
        .set((
            status::last_apply_epoch.eq(apply_epoch),
            status::applied_version.eq(version),
            status::apply_ok.eq(ok),
            status::apply_error.eq(&error),
        ))
        .execute(conn)
}

/// Status row for one device.
pub fn status_for(conn: &mut SqliteConnection, device: &str) -> QueryResult<Option<StatusRow>> {
    status::table
        .find(device)
        .select(StatusRow::as_select())
        .first(conn)
        .optional()
}

/// All status rows.
pub fn statuses(conn: &mut SqliteConnection) -> QueryResult<Vec<StatusRow>> {
    status::table.select(StatusRow::as_select()).load(conn)
}

/// Newest plans first, capped at `limit`.
pub fn list_recent(conn: &mut SqliteConnection, limit: i64) -> QueryResult<Vec<PlanRow>> {
    plans::table
        .order(plans::id.desc())
        .limit(limit)
        .select(PlanRow::as_select())
        .load(conn)
}
