//! Device-facing endpoints: the scheduling poll, telemetry check-in, and the
//! config plan exchange.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::scheduler::{self, Decision};
use crate::store::devices::{CheckinRecord, TriState};
use crate::store::{devices, plans};
use crate::tz::{local_date, now_epoch};

use super::{AppState, frame_token, public_base, validate_device_id};

#[derive(Debug, Deserialize)]
pub(super) struct NextQuery {
    device_id: String,
    now_epoch: Option<i64>,
    default_poll_seconds: Option<i64>,
    failure_count: Option<i64>,
}

/// `GET /api/v1/device/next`
pub(super) async fn next(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<NextQuery>,
) -> ApiResult<Json<Decision>> {
    validate_device_id(&q.device_id)?;
    state
        .auth
        .require_device(&q.device_id, frame_token(&headers).as_deref())?;

    let now = q.now_epoch.unwrap_or_else(now_epoch);
    let default_poll = q
        .default_poll_seconds
        .unwrap_or(state.cfg.default_poll_seconds);
    // The decision only needs the URL; the daily image itself is never
    // fetched here, so upstream outages cannot break the poll.
    let daily_url = state.upstream.image_url(local_date(now, state.cfg.tz));
    let base = public_base(&state.cfg, &headers);

    let decision = scheduler::next_for_device(
        &state.store,
        &q.device_id,
        now,
        default_poll,
        q.failure_count.unwrap_or(0),
        daily_url,
        &base,
    )?;
    Ok(Json(decision))
}

fn default_poll_interval() -> i64 {
    3600
}

fn default_image_source() -> String {
    "daily".to_string()
}

fn default_battery_percent() -> i32 {
    -1
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckinPayload {
    device_id: String,
    checkin_epoch: i64,
    next_wakeup_epoch: i64,
    #[serde(default)]
    sleep_seconds: i64,
    #[serde(default = "default_poll_interval")]
    poll_interval_seconds: i64,
    #[serde(default)]
    failure_count: i64,
    #[serde(default)]
    last_http_status: i32,
    #[serde(default)]
    fetch_ok: bool,
    #[serde(default)]
    image_changed: bool,
    #[serde(default = "default_image_source")]
    image_source: String,
    #[serde(default)]
    last_error: String,
    #[serde(default)]
    battery_mv: i32,
    #[serde(default = "default_battery_percent")]
    battery_percent: i32,
    #[serde(default)]
    charging: TriState,
    #[serde(default)]
    vbus_good: TriState,
    #[serde(default)]
    reported_config: Option<Value>,
    #[serde(default)]
    reported_config_epoch: Option<i64>,
}

/// `POST /api/v1/device/checkin`
pub(super) async fn checkin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckinPayload>,
) -> ApiResult<Json<Value>> {
    validate_device_id(&payload.device_id)?;
    state
        .auth
        .require_device(&payload.device_id, frame_token(&headers).as_deref())?;

    let now = now_epoch();
    let reported_json = payload
        .reported_config
        .as_ref()
        .map(|v| v.to_string());
    let reported_epoch = payload
        .reported_config
        .is_some()
        .then(|| payload.reported_config_epoch.unwrap_or(now));

    let record = CheckinRecord {
        device_id: &payload.device_id,
        last_checkin_epoch: payload.checkin_epoch,
        next_wakeup_epoch: payload.next_wakeup_epoch,
        sleep_seconds: payload.sleep_seconds.max(0),
        poll_interval_seconds: payload.poll_interval_seconds.max(60),
        failure_count: payload.failure_count.max(0),
        last_http_status: payload.last_http_status,
        fetch_ok: payload.fetch_ok,
        image_changed: payload.image_changed,
        image_source: &payload.image_source,
        last_error: &payload.last_error,
        battery_mv: payload.battery_mv,
        battery_percent: payload.battery_percent,
        charging: payload.charging.wire(),
        vbus_good: payload.vbus_good.wire(),
        reported_config_json: reported_json.as_deref(),
        reported_config_epoch: reported_epoch,
        updated_at: now,
    };
    state
        .store
        .write(|conn| Ok(devices::upsert_checkin(conn, &record)?))?;

    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub(super) struct ConfigQuery {
    device_id: String,
    #[serde(default)]
    current_version: i64,
}

/// `GET /api/v1/device/config`
///
/// Returns the full, non-redacted plan: the device is the one party allowed
/// to see its own secrets.
pub(super) async fn config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ConfigQuery>,
) -> ApiResult<Json<Value>> {
    validate_device_id(&q.device_id)?;
    state
        .auth
        .require_device(&q.device_id, frame_token(&headers).as_deref())?;

    let now = now_epoch();
    let plan = state.store.write(|conn| {
        let plan = plans::resolve_for(conn, &q.device_id)?;
        let target = plan.as_ref().map_or(0, |p| p.id);
        plans::record_query(conn, &q.device_id, now, q.current_version, target)?;
        Ok(plan)
    })?;

    let (version, config, note, created_epoch) = match &plan {
        Some(p) => {
            let parsed: Value = serde_json::from_str(&p.config_json)
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored plan {} unreadable: {e}", p.id)))?;
            (p.id, parsed, p.note.clone(), p.created_epoch)
        }
        None => (0, json!({}), String::new(), 0),
    };

    Ok(Json(json!({
        "device_id": q.device_id,
        "server_epoch": now,
        "config_version": version,
        "config": config,
        "note": note,
        "created_epoch": created_epoch,
    })))
}

#[derive(Debug, Deserialize)]
pub(super) struct AppliedPayload {
    device_id: String,
    config_version: i64,
    applied: bool,
    #[serde(default)]
    error: String,
    #[serde(default)]
    applied_epoch: Option<i64>,
}

/// `POST /api/v1/device/config/applied`
pub(super) async fn config_applied(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AppliedPayload>,
) -> ApiResult<Json<Value>> {
    validate_device_id(&payload.device_id)?;
    state
        .auth
        .require_device(&payload.device_id, frame_token(&headers).as_deref())?;

    let apply_epoch = payload.applied_epoch.unwrap_or_else(now_epoch);
    state.store.write(|conn| {
        Ok(plans::record_applied(
            conn,
            &payload.device_id,
            apply_epoch,
            payload.config_version,
            payload.applied,
            &payload.error,
        )?)
    })?;

    if !payload.applied {
        tracing::warn!(
            device_id = %payload.device_id,
            version = payload.config_version,
            error = %payload.error,
            "device failed to apply config"
        );
    }
    Ok(Json(json!({ "ok": true })))
}
