//! HTTP surface: thin axum adapters over the core modules.
//!
//! Handlers parse and validate, call into the core, and serialize. No
//! scheduling or store logic lives here.

mod device;
mod operator;
mod public;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use daily_upstream::DailyUpstream;

use crate::assets::AssetSink;
use crate::auth::AuthGate;
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::store::Store;

/// Header carrying operator and device tokens.
pub const TOKEN_HEADER: &str = "x-photoframe-token";

/// Upload size cap; uncompressed camera dumps are common operator inputs.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub cfg: Arc<ServerConfig>,
    pub auth: Arc<AuthGate>,
    pub assets: AssetSink,
    pub upstream: Arc<DailyUpstream>,
}

impl AppState {
    /// Wire the shared components together.
    pub fn new(
        store: Store,
        cfg: ServerConfig,
        assets: AssetSink,
        upstream: DailyUpstream,
    ) -> Self {
        let auth = Arc::new(cfg.auth_gate());
        Self {
            store: Arc::new(store),
            cfg: Arc::new(cfg),
            auth,
            assets,
            upstream: Arc::new(upstream),
        }
    }
}

/// The full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(public::healthz))
        .route("/", get(public::index))
        .route("/api/v1/assets/{name}", get(public::asset))
        .route("/api/v1/device/next", get(device::next))
        .route("/api/v1/device/checkin", post(device::checkin))
        .route("/api/v1/device/config", get(device::config))
        .route("/api/v1/device/config/applied", post(device::config_applied))
        .route("/api/v1/devices", get(public::devices))
        .route("/api/v1/publish-history", get(operator::publish_history))
        .route("/api/v1/device-configs", get(operator::list_device_configs))
        .route("/api/v1/device-config", post(operator::publish_device_config))
        .route("/api/v1/overrides", get(operator::list_overrides))
        .route("/api/v1/overrides/upload", post(operator::upload_override))
        .route("/api/v1/overrides/{id}", delete(operator::delete_override))
        .route("/api/v1/preview/current.bmp", get(operator::preview_current))
        .route("/public/daily.bmp", get(public::public_daily))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// The token presented with the request, if any.
pub(crate) fn frame_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Base URL for links handed to devices: the configured public base wins,
/// otherwise it is derived from the incoming request.
pub(crate) fn public_base(cfg: &ServerConfig, headers: &HeaderMap) -> String {
    if let Some(base) = &cfg.public_base_url {
        return base.clone();
    }
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

/// Device ids are bounded printable identifiers.
pub(crate) fn validate_device_id(device_id: &str) -> ApiResult<()> {
    let ok = (1..=64).contains(&device_id.len())
        && device_id.chars().all(|c| c.is_ascii_graphic());
    if ok {
        Ok(())
    } else {
        Err(ApiError::ClientInput(
            "device_id must be 1-64 printable characters".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_bounds() {
        assert!(validate_device_id("frame-01").is_ok());
        assert!(validate_device_id("*").is_ok());
        assert!(validate_device_id("").is_err());
        assert!(validate_device_id(&"x".repeat(65)).is_err());
        assert!(validate_device_id("has space").is_err());
    }
}
