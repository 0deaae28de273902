//! Environment-driven server configuration.
//!
//! Every knob has a default so a bare `photoframe-orchestrator` on a LAN
//! works with zero configuration; tokens stay optional on purpose (an empty
//! operator token disables the gate for trusted networks).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use chrono_tz::Tz;
use shared_utils::env::{env_opt, env_or};

use crate::auth::{AuthGate, parse_device_token_map};

/// Fallback daily-image template pointing at the LAN render host.
pub const DEFAULT_DAILY_TEMPLATE: &str = "http://192.168.58.113:8000/image/480x800?date=%DATE%";

/// Resolved configuration for one server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Daily-image URL template, `%DATE%` placeholder allowed.
    pub daily_template: String,
    /// Base URL used verbatim for asset links when set; otherwise derived
    /// per-request. Trailing slash trimmed.
    pub public_base_url: Option<String>,
    /// Default device poll interval, floored at 60 seconds.
    pub default_poll_seconds: i64,
    /// Operator token; `None` disables the operator gate.
    pub operator_token: Option<String>,
    /// Public photo token; `None` disables `/public/daily.bmp`.
    pub public_photo_token: Option<String>,
    /// Per-device tokens with optional `*` wildcard.
    pub device_tokens: HashMap<String, String>,
    /// Timeout for daily upstream fetches, floored at 1 second.
    pub daily_fetch_timeout: Duration,
    /// Configured IANA zone.
    pub tz: Tz,
    /// The zone's name as configured, echoed by `/healthz`.
    pub tz_name: String,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let daily_template = env_or("DAILY_IMAGE_URL_TEMPLATE", DEFAULT_DAILY_TEMPLATE);
        let public_base_url = env_opt("PUBLIC_BASE_URL").map(|s| s.trim_end_matches('/').to_string());

        let default_poll_seconds = env_or("DEFAULT_POLL_SECONDS", "3600")
            .parse::<i64>()
            .context("DEFAULT_POLL_SECONDS must be an integer")?
            .max(60);

        let device_tokens = parse_device_token_map(
            env_opt("DEVICE_TOKEN_MAP_JSON").as_deref(),
            env_opt("DEVICE_TOKEN_MAP").as_deref(),
        )
        .map_err(|e| anyhow::anyhow!("device token map: {e}"))?;

        let timeout_seconds = env_or("DAILY_FETCH_TIMEOUT_SECONDS", "10")
            .parse::<u64>()
            .context("DAILY_FETCH_TIMEOUT_SECONDS must be an integer")?
            .max(1);

        let tz_name = env_or("TZ", "Asia/Shanghai");
        let tz: Tz = tz_name
            .parse()
            .map_err(|_| anyhow::anyhow!("TZ is not a known IANA zone: {tz_name}"))?;

        Ok(Self {
            daily_template,
            public_base_url,
            default_poll_seconds,
            operator_token: env_opt("PHOTOFRAME_TOKEN"),
            public_photo_token: env_opt("PUBLIC_DAILY_BMP_TOKEN"),
            device_tokens,
            daily_fetch_timeout: Duration::from_secs(timeout_seconds),
            tz,
            tz_name,
        })
    }

    /// The auth gate this configuration implies.
    pub fn auth_gate(&self) -> AuthGate {
        AuthGate::new(
            self.operator_token.clone(),
            self.device_tokens.clone(),
            self.public_photo_token.clone(),
        )
    }
}
