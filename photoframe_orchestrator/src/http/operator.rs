//! Operator endpoints: override lifecycle, config plans, listings, preview.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::planner::{redact_config, sanitize_config};
use crate::scheduler::{self, asset_url, place_override, window_state};
use crate::store::overrides::{NewOverride, WILDCARD_DEVICE};
use crate::store::{devices, history, overrides, plans};
use crate::tz::{local_date, now_epoch, parse_starts_at};

use super::{AppState, frame_token, public_base, validate_device_id};

/// `POST /api/v1/overrides/upload` (multipart)
pub(super) async fn upload_override(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    state
        .auth
        .require_operator(frame_token(&headers).as_deref())?;

    let mut file: Option<Vec<u8>> = None;
    let mut duration_minutes: Option<i64> = None;
    let mut device_id = WILDCARD_DEVICE.to_string();
    let mut starts_at: Option<String> = None;
    let mut note = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::ClientInput(format!("bad multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::ClientInput(format!("bad file field: {e}")))?;
                file = Some(bytes.to_vec());
            }
            "duration_minutes" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::ClientInput(format!("bad duration field: {e}")))?;
                duration_minutes = Some(text.trim().parse().map_err(|_| {
                    ApiError::ClientInput("duration_minutes must be an integer".into())
                })?);
            }
            "device_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::ClientInput(format!("bad device_id field: {e}")))?;
                let trimmed = text.trim().to_string();
                if !trimmed.is_empty() {
                    device_id = trimmed;
                }
            }
            "starts_at" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::ClientInput(format!("bad starts_at field: {e}")))?;
                if !text.trim().is_empty() {
                    starts_at = Some(text);
                }
            }
            "note" => {
                note = field
                    .text()
                    .await
                    .map_err(|e| ApiError::ClientInput(format!("bad note field: {e}")))?;
            }
            _ => {}
        }
    }

    let raw = file.ok_or_else(|| ApiError::ClientInput("file field required".into()))?;
    let duration_minutes =
        duration_minutes.ok_or_else(|| ApiError::ClientInput("duration_minutes required".into()))?;
    if duration_minutes <= 0 {
        return Err(ApiError::ClientInput("duration_minutes must be > 0".into()));
    }
    if device_id != WILDCARD_DEVICE {
        validate_device_id(&device_id)?;
    }

    let explicit_start = starts_at
        .as_deref()
        .map(|s| parse_starts_at(s, state.cfg.tz))
        .transpose()?;

    let stored = state.assets.store_normalized(&raw)?;
    let now = now_epoch();

    let next_wakeup = if device_id == WILDCARD_DEVICE {
        None
    } else {
        state
            .store
            .read(|conn| Ok(devices::next_wakeup(conn, &device_id)?))?
    };
    let placement = place_override(&device_id, explicit_start, duration_minutes, now, next_wakeup);

    let override_id = state.store.write(|conn| {
        Ok(overrides::insert(
            conn,
            &NewOverride {
                device_id: &device_id,
                start_epoch: placement.start_epoch,
                end_epoch: placement.end_epoch,
                asset_name: &stored.name,
                asset_sha256: &stored.sha256,
                note: &note,
                created_epoch: now,
            },
        )?)
    })?;

    tracing::info!(
        override_id,
        device_id = %device_id,
        start = placement.start_epoch,
        end = placement.end_epoch,
        policy = ?placement.start_policy,
        "override scheduled"
    );

    let image_url = asset_url(&public_base(&state.cfg, &headers), &stored.name);
    Ok(Json(json!({
        "ok": true,
        "id": override_id,
        "device_id": device_id,
        "start_epoch": placement.start_epoch,
        "end_epoch": placement.end_epoch,
        "duration_minutes": duration_minutes,
        "image_url": image_url,
        "asset_sha256": stored.sha256,
        "start_policy": placement.start_policy,
        "will_expire_before_effective": placement.will_expire_before_effective,
        "expected_effective_epoch": placement.expected_effective_epoch,
    })))
}

/// `DELETE /api/v1/overrides/{id}`
pub(super) async fn delete_override(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(override_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state
        .auth
        .require_operator(frame_token(&headers).as_deref())?;

    let found = state
        .store
        .write(|conn| Ok(overrides::disable(conn, override_id)?))?;
    if !found {
        return Err(ApiError::NotFound("override not found".into()));
    }
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub(super) struct NowQuery {
    now_epoch: Option<i64>,
}

/// `GET /api/v1/overrides`
pub(super) async fn list_overrides(
    State(state): State<AppState>,
    Query(q): Query<NowQuery>,
) -> ApiResult<Json<Value>> {
    let now = q.now_epoch.unwrap_or_else(now_epoch);

    let items = state.store.read(|conn| {
        let rows = overrides::list_recent(conn, 200)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let expected_effective = if row.device_id == WILDCARD_DEVICE {
                None
            } else {
                devices::next_wakeup(conn, &row.device_id)?
                    .map(|w| w.max(row.start_epoch))
                    .or(Some(row.start_epoch))
            };
            items.push(json!({
                "id": row.id,
                "device_id": row.device_id,
                "start_epoch": row.start_epoch,
                "end_epoch": row.end_epoch,
                "state": window_state(now, row.start_epoch, row.end_epoch),
                "asset_name": row.asset_name,
                "asset_sha256": row.asset_sha256,
                "note": row.note,
                "created_epoch": row.created_epoch,
                "expected_effective_epoch": expected_effective,
            }));
        }
        Ok(items)
    })?;

    Ok(Json(json!({ "now_epoch": now, "overrides": items })))
}

#[derive(Debug, Deserialize)]
pub(super) struct LimitQuery {
    limit: Option<i64>,
}

/// `GET /api/v1/publish-history`
pub(super) async fn publish_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Value>> {
    state
        .auth
        .require_operator(frame_token(&headers).as_deref())?;

    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    let rows = state
        .store
        .read(|conn| Ok(history::list_recent(conn, limit)?))?;
    Ok(Json(json!({ "now_epoch": now_epoch(), "history": rows })))
}

/// `GET /api/v1/device-configs`
pub(super) async fn list_device_configs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Value>> {
    state
        .auth
        .require_operator(frame_token(&headers).as_deref())?;

    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let rows = state
        .store
        .read(|conn| Ok(plans::list_recent(conn, limit)?))?;

    let items: Vec<Value> = rows
        .iter()
        .map(|row| {
            let parsed: Value =
                serde_json::from_str(&row.config_json).unwrap_or_else(|_| json!({}));
            json!({
                "version": row.id,
                "device_id": row.device_id,
                "config": redact_config(&parsed),
                "note": row.note,
                "created_epoch": row.created_epoch,
            })
        })
        .collect();
    Ok(Json(json!({ "now_epoch": now_epoch(), "plans": items })))
}

#[derive(Debug, Deserialize)]
pub(super) struct PublishConfigPayload {
    #[serde(default)]
    device_id: Option<String>,
    config: Value,
    #[serde(default)]
    note: String,
}

/// `POST /api/v1/device-config`
pub(super) async fn publish_device_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PublishConfigPayload>,
) -> ApiResult<Json<Value>> {
    state
        .auth
        .require_operator(frame_token(&headers).as_deref())?;

    let device_id = payload
        .device_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(WILDCARD_DEVICE)
        .to_string();
    if device_id != WILDCARD_DEVICE {
        validate_device_id(&device_id)?;
    }

    let sanitized = sanitize_config(&payload.config)?;
    let config_json = Value::Object(sanitized).to_string();
    let now = now_epoch();

    let version = state.store.write(|conn| {
        Ok(plans::insert_plan(
            conn,
            &device_id,
            &config_json,
            &payload.note,
            now,
        )?)
    })?;

    tracing::info!(version, device_id = %device_id, "config plan published");
    let stored: Value = serde_json::from_str(&config_json).unwrap_or_else(|_| json!({}));
    Ok(Json(json!({
        "ok": true,
        "version": version,
        "device_id": device_id,
        "config": redact_config(&stored),
        "created_epoch": now,
    })))
}

#[derive(Debug, Deserialize)]
pub(super) struct PreviewQuery {
    device_id: Option<String>,
    now_epoch: Option<i64>,
}

/// `GET /api/v1/preview/current.bmp`
///
/// Resolves the same decision a device would get, read-only (no history row,
/// no device upsert), then materializes the bytes.
pub(super) async fn preview_current(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<PreviewQuery>,
) -> ApiResult<Response> {
    state
        .auth
        .require_operator(frame_token(&headers).as_deref())?;

    let device_id = q.device_id.unwrap_or_else(|| WILDCARD_DEVICE.to_string());
    let now = q.now_epoch.unwrap_or_else(now_epoch);

    let bytes = match scheduler::peek_active(&state.store, &device_id, now)? {
        Some(active) => {
            let path = state
                .assets
                .lookup(&active.asset_name)
                .ok_or_else(|| ApiError::NotFound("override asset missing".into()))?;
            tokio::fs::read(&path)
                .await
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("read asset: {e}")))?
        }
        None => {
            state
                .upstream
                .fetch(local_date(now, state.cfg.tz))
                .await?
        }
    };
    Ok(bmp_response(bytes))
}

pub(super) fn bmp_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/bmp")], bytes).into_response()
}
