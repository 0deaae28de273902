//! Unauthenticated and public-token endpoints: health, console, assets,
//! device listing, and the simple-client daily photo.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::planner::redact_config;
use crate::store::devices::{self, TriState};
use crate::store::plans;
use crate::tz::{local_date, now_epoch};

use super::operator::bmp_response;
use super::{AppState, frame_token};

/// `GET /healthz`
pub(super) async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "now_epoch": now_epoch(),
        "timezone": state.cfg.tz_name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /`, the operator console, served verbatim.
pub(super) async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

/// `GET /api/v1/assets/{name}`
pub(super) async fn asset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let path = state
        .assets
        .lookup(&name)
        .ok_or_else(|| ApiError::NotFound("asset not found".into()))?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("read asset: {e}")))?;
    Ok(bmp_response(bytes))
}

/// `GET /api/v1/devices`
pub(super) async fn devices(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let now = now_epoch();
    let (rows, status) = state.store.read(|conn| {
        let rows = devices::list(conn)?;
        let status: HashMap<String, plans::StatusRow> = plans::statuses(conn)?
            .into_iter()
            .map(|s| (s.device_id.clone(), s))
            .collect();
        Ok((rows, status))
    })?;

    let items: Vec<Value> = rows
        .iter()
        .map(|row| {
            let eta = (row.next_wakeup_epoch > 0).then(|| (row.next_wakeup_epoch - now).max(0));
            let reported: Option<Value> = (!row.reported_config_json.is_empty())
                .then(|| serde_json::from_str(&row.reported_config_json).ok())
                .flatten();
            let st = status.get(&row.device_id);
            json!({
                "device_id": row.device_id,
                "last_checkin_epoch": row.last_checkin_epoch,
                "next_wakeup_epoch": row.next_wakeup_epoch,
                "eta_seconds": eta,
                "sleep_seconds": row.sleep_seconds,
                "poll_interval_seconds": row.poll_interval_seconds,
                "failure_count": row.failure_count,
                "last_http_status": row.last_http_status,
                "fetch_ok": row.fetch_ok,
                "image_changed": row.image_changed,
                "image_source": row.image_source,
                "last_error": row.last_error,
                "battery_mv": row.battery_mv,
                "battery_percent": row.battery_percent,
                "charging": TriState::from_wire(row.charging as i64),
                "vbus_good": TriState::from_wire(row.vbus_good as i64),
                "reported_config": reported.as_ref().map(redact_config),
                "reported_config_epoch": row.reported_config_epoch,
                "config_target_version": st.map_or(0, |s| s.target_version),
                "config_applied_version": st.map_or(0, |s| s.applied_version),
                "config_apply_ok": st.is_some_and(|s| s.apply_ok),
                "config_apply_error": st.map_or("", |s| s.apply_error.as_str()),
                "updated_at": row.updated_at,
            })
        })
        .collect();

    Ok(Json(json!({ "now_epoch": now, "devices": items })))
}

#[derive(Debug, Deserialize)]
pub(super) struct PublicPhotoQuery {
    token: Option<String>,
}

/// `GET /public/daily.bmp`
///
/// For dumb display clients that can't set headers: the token may ride in
/// the query string instead.
pub(super) async fn public_daily(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<PublicPhotoQuery>,
) -> ApiResult<Response> {
    let provided = frame_token(&headers).or(q.token);
    state.auth.require_public_photo(provided.as_deref())?;

    let bytes = state
        .upstream
        .fetch(local_date(now_epoch(), state.cfg.tz))
        .await?;
    Ok(bmp_response(bytes))
}
