//! Device rows: presence upserts, check-in telemetry, and listings.
//!
//! Devices appear on first contact and are never deleted by the core. A
//! `device/next` poll only touches `updated_at` and `failure_count`; a full
//! check-in replaces the whole telemetry projection.

use diesel::prelude::*;
use serde::{Deserialize, Serialize, Serializer};

use crate::schema::devices;

/// Charging/VBUS state as reported by the power rail: the wire encoding is
/// `-1` unknown, `0` off, `1` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    /// The device could not sample the line.
    #[default]
    Unknown,
    /// Sampled low.
    Off,
    /// Sampled high.
    On,
}

impl TriState {
    /// Decode the `-1/0/1` wire value.
    pub fn from_wire(v: i64) -> Self {
        match v {
            0 => TriState::Off,
            v if v > 0 => TriState::On,
            _ => TriState::Unknown,
        }
    }

    /// The `-1/0/1` wire value.
    pub fn wire(self) -> i32 {
        match self {
            TriState::Unknown => -1,
            TriState::Off => 0,
            TriState::On => 1,
        }
    }
}

impl Serialize for TriState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.wire())
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(TriState::from_wire(i64::deserialize(deserializer)?))
    }
}

/// Full device row as stored.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = devices)]
pub struct DeviceRow {
    pub device_id: String,
    pub last_checkin_epoch: i64,
    pub next_wakeup_epoch: i64,
    pub sleep_seconds: i64,
    pub poll_interval_seconds: i64,
    pub failure_count: i64,
    pub last_http_status: i32,
    pub fetch_ok: bool,
    pub image_changed: bool,
    pub image_source: String,
    pub last_error: String,
    pub battery_mv: i32,
    pub battery_percent: i32,
    pub charging: i32,
    pub vbus_good: i32,
    pub reported_config_json: String,
    pub reported_config_epoch: i64,
    pub updated_at: i64,
}

/// Check-in telemetry to upsert. `None` config fields leave the stored
/// snapshot untouched.
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = devices)]
pub struct CheckinRecord<'a> {
    pub device_id: &'a str,
    pub last_checkin_epoch: i64,
    pub next_wakeup_epoch: i64,
    pub sleep_seconds: i64,
    pub poll_interval_seconds: i64,
    pub failure_count: i64,
    pub last_http_status: i32,
    pub fetch_ok: bool,
    pub image_changed: bool,
    pub image_source: &'a str,
    pub last_error: &'a str,
    pub battery_mv: i32,
    pub battery_percent: i32,
    pub charging: i32,
    pub vbus_good: i32,
    pub reported_config_json: Option<&'a str>,
    pub reported_config_epoch: Option<i64>,
    pub updated_at: i64,
}

/// Upsert-on-poll: create the row if this is first contact, otherwise only
/// refresh `updated_at` and the reported failure count.
pub fn touch(
    conn: &mut SqliteConnection,
    device: &str,
    now: i64,
    failure_count: i64,
) -> QueryResult<usize> {
    let fc = failure_count.max(0);
    diesel::insert_into(devices::table)
        .values((
            devices::device_id.eq(device),
            devices::updated_at.eq(now),
            devices::failure_count.eq(fc),
        ))
        .on_conflict(devices::device_id)
        .do_update()
        .set((devices::updated_at.eq(now), devices::failure_count.eq(fc)))
        .execute(conn)
}

/// Upsert a full check-in.
pub fn upsert_checkin(conn: &mut SqliteConnection, record: &CheckinRecord<'_>) -> QueryResult<usize> {
    diesel::insert_into(devices::table)
        .values(record)
        .on_conflict(devices::device_id)
        .do_update()
        .set(record)
        .execute(conn)
}

/// The wakeup epoch the device last promised, if it ever checked in.
pub fn next_wakeup(conn: &mut SqliteConnection, device: &str) -> QueryResult<Option<i64>> {
    devices::table
        .find(device)
        .select(devices::next_wakeup_epoch)
        .first(conn)
        .optional()
}

/// All devices, soonest promised wakeup first; devices that never reported
/// one sort last, then by id.
pub fn list(conn: &mut SqliteConnection) -> QueryResult<Vec<DeviceRow>> {
    let mut rows: Vec<DeviceRow> = devices::table
        .select(DeviceRow::as_select())
        .load(conn)?;
    rows.sort_by(|a, b| {
        let key = |r: &DeviceRow| {
            if r.next_wakeup_epoch > 0 {
                r.next_wakeup_epoch
            } else {
                i64::MAX
            }
        };
        key(a).cmp(&key(b)).then_with(|| a.device_id.cmp(&b.device_id))
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tri_state_wire_round_trip() {
        assert_eq!(TriState::from_wire(-1), TriState::Unknown);
        assert_eq!(TriState::from_wire(0), TriState::Off);
        assert_eq!(TriState::from_wire(1), TriState::On);
        for s in [TriState::Unknown, TriState::Off, TriState::On] {
            assert_eq!(TriState::from_wire(s.wire() as i64), s);
        }
    }

    #[test]
    fn tri_state_serde_uses_wire_ints() {
        let v: TriState = serde_json::from_str("-1").unwrap();
        assert_eq!(v, TriState::Unknown);
        assert_eq!(serde_json::to_string(&TriState::On).unwrap(), "1");
    }
}
