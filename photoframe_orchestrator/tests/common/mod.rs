#![allow(dead_code)]

use std::time::Duration;

use daily_upstream::DailyUpstream;
use tempfile::TempDir;

use photoframe_orchestrator::assets::AssetSink;
use photoframe_orchestrator::config::ServerConfig;
use photoframe_orchestrator::http::{AppState, router};
use photoframe_orchestrator::store::Store;
use photoframe_orchestrator::store::overrides::{self, NewOverride};

/// Throwaway store backed by a tempdir; keep the dir alive for the test.
pub fn setup_store() -> (TempDir, Store) {
    let dir = TempDir::new().expect("tempdir");
    let store = Store::open(dir.path().join("orchestrator.db")).expect("open store");
    (dir, store)
}

/// A config with no tokens, UTC, and a placeholder template: the shape most
/// tests want.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        daily_template: "http://daily.test/image/480x800?date=%DATE%".into(),
        public_base_url: None,
        default_poll_seconds: 3600,
        operator_token: None,
        public_photo_token: None,
        device_tokens: Default::default(),
        daily_fetch_timeout: Duration::from_secs(1),
        tz: chrono_tz::UTC,
        tz_name: "UTC".into(),
    }
}

/// Full router over a fresh store, for tower::oneshot tests.
pub fn test_router(cfg: ServerConfig) -> (TempDir, axum::Router) {
    let dir = TempDir::new().expect("tempdir");
    let store = Store::open(dir.path().join("orchestrator.db")).expect("open store");
    let assets = AssetSink::new(dir.path().join("assets"));
    let upstream =
        DailyUpstream::new(cfg.daily_template.clone(), cfg.daily_fetch_timeout).expect("upstream");
    let app = router(AppState::new(store, cfg, assets, upstream));
    (dir, app)
}

/// Insert an enabled override window directly.
pub fn insert_override(
    store: &Store,
    device: &str,
    start: i64,
    end: i64,
    created: i64,
    asset: &str,
) -> i64 {
    store
        .write(|conn| {
            Ok(overrides::insert(
                conn,
                &NewOverride {
                    device_id: device,
                    start_epoch: start,
                    end_epoch: end,
                    asset_name: asset,
                    asset_sha256: asset.trim_end_matches(".bmp"),
                    note: "",
                    created_epoch: created,
                },
            )?)
        })
        .expect("insert override")
}
