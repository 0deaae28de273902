//! Override windows: operator-scheduled images that replace the daily
//! default for one device or all of them (`*`).
//!
//! Windows are half-open `[start, end)`, fixed at creation, and soft-deleted
//! so the history stays reconstructible. Overlap is allowed; precedence at
//! query time is device-specific over wildcard, then newest creation.

use diesel::prelude::*;
use serde::Serialize;

use crate::schema::overrides;

/// Target id matching any device.
pub const WILDCARD_DEVICE: &str = "*";

/// Stored override window.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = overrides)]
pub struct OverrideRow {
    pub id: i64,
    pub device_id: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub asset_name: String,
    pub asset_sha256: String,
    pub note: String,
    pub created_epoch: i64,
    pub enabled: bool,
}

/// A new window to insert. `enabled` defaults on.
#[derive(Debug, Insertable)]
#[diesel(table_name = overrides)]
pub struct NewOverride<'a> {
    pub device_id: &'a str,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub asset_name: &'a str,
    pub asset_sha256: &'a str,
    pub note: &'a str,
    pub created_epoch: i64,
}

/// Insert a window, returning its id.
pub fn insert(conn: &mut SqliteConnection, row: &NewOverride<'_>) -> QueryResult<i64> {
    diesel::insert_into(overrides::table)
        .values(row)
        .returning(overrides::id)
        .get_result(conn)
}

/// The window covering `now` for `device`, if any.
///
/// Device-specific windows beat wildcard ones; among equals the most
/// recently created wins.
pub fn active_for(
    conn: &mut SqliteConnection,
    device: &str,
    now: i64,
) -> QueryResult<Option<OverrideRow>> {
    overrides::table
        .filter(overrides::enabled.eq(true))
        .filter(overrides::start_epoch.le(now))
        .filter(overrides::end_epoch.gt(now))
        .filter(
            overrides::device_id
                .eq(device)
                .or(overrides::device_id.eq(WILDCARD_DEVICE)),
        )
        .order((
            overrides::device_id.eq(device).desc(),
            overrides::created_epoch.desc(),
        ))
        .select(OverrideRow::as_select())
        .first(conn)
        .optional()
}

/// Start of the nearest window for `device` that has not begun yet.
pub fn nearest_upcoming_start(
    conn: &mut SqliteConnection,
    device: &str,
    now: i64,
) -> QueryResult<Option<i64>> {
    overrides::table
        .filter(overrides::enabled.eq(true))
        .filter(overrides::start_epoch.gt(now))
        .filter(
            overrides::device_id
                .eq(device)
                .or(overrides::device_id.eq(WILDCARD_DEVICE)),
        )
        .order(overrides::start_epoch.asc())
        .select(overrides::start_epoch)
        .first(conn)
        .optional()
}

/// Soft-delete a window. Returns false when the id does not exist.
pub fn disable(conn: &mut SqliteConnection, override_id: i64) -> QueryResult<bool> {
    let n = diesel::update(overrides::table.find(override_id))
        .set(overrides::enabled.eq(false))
        .execute(conn)?;
    Ok(n > 0)
}

/// Enabled windows, newest first, capped at `limit`.
pub fn list_recent(conn: &mut SqliteConnection, limit: i64) -> QueryResult<Vec<OverrideRow>> {
    overrides::table
        .filter(overrides::enabled.eq(true))
        .order((overrides::start_epoch.desc(), overrides::id.desc()))
        .limit(limit)
        .select(OverrideRow::as_select())
        .load(conn)
}
