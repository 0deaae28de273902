//! The scheduling decision: what a device shows next and when it wakes.
//!
//! The device's own wake schedule must never be the only clock. The server
//! owns the tighter bound: `poll_after_seconds` is shrunk against both the
//! end of an active override window and the start of the nearest upcoming
//! one, so windows begin and end within one poll cycle of their nominal
//! edges. The interval is bounded below by 60s to avoid thrash and above by
//! one day so a device never sleeps indefinitely.

use serde::Serialize;

use crate::error::ApiResult;
use crate::store::overrides::{self, OverrideRow, WILDCARD_DEVICE};
use crate::store::{Store, devices, history};

/// Lower bound for the returned poll interval.
pub const MIN_POLL_SECONDS: i64 = 60;
/// Upper bound for the returned poll interval.
pub const MAX_POLL_SECONDS: i64 = 86_400;

/// Clamp a poll interval into `[MIN_POLL_SECONDS, MAX_POLL_SECONDS]`.
pub fn clamp_poll(seconds: i64) -> i64 {
    seconds.clamp(MIN_POLL_SECONDS, MAX_POLL_SECONDS)
}

/// Where the next image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// The daily rendering upstream.
    Daily,
    /// An operator-scheduled override window.
    Override,
}

impl ImageSource {
    /// Tag stored in publish history.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSource::Daily => "daily",
            ImageSource::Override => "override",
        }
    }
}

/// Outcome of a `device/next` call.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub device_id: String,
    pub server_epoch: i64,
    pub source: ImageSource,
    pub image_url: String,
    pub valid_until_epoch: i64,
    pub poll_after_seconds: i64,
    pub default_poll_seconds: i64,
    pub active_override_id: Option<i64>,
}

/// Asset download URL as seen by a device.
pub fn asset_url(public_base: &str, asset_name: &str) -> String {
    format!("{public_base}/api/v1/assets/{asset_name}")
}

/// Pure decision step: pick the source and shrink the poll interval against
/// the window boundaries. No I/O.
pub fn decide(
    device_id: &str,
    now: i64,
    default_poll: i64,
    daily_image_url: String,
    public_base: &str,
    active: Option<&OverrideRow>,
    upcoming_start: Option<i64>,
) -> Decision {
    let default_poll = clamp_poll(default_poll);
    let mut poll = default_poll;
    let mut decision = Decision {
        device_id: device_id.to_string(),
        server_epoch: now,
        source: ImageSource::Daily,
        image_url: daily_image_url,
        valid_until_epoch: now + poll,
        poll_after_seconds: poll,
        default_poll_seconds: default_poll,
        active_override_id: None,
    };

    if let Some(active) = active {
        decision.source = ImageSource::Override;
        decision.active_override_id = Some(active.id);
        decision.valid_until_epoch = active.end_epoch;
        decision.image_url = asset_url(public_base, &active.asset_name);
        let remain = (active.end_epoch - now).max(1);
        poll = poll.min(clamp_poll(remain));
    }

    if let Some(start) = upcoming_start {
        let until_next = (start - now).max(1);
        poll = poll.min(clamp_poll(until_next));
    }

    decision.poll_after_seconds = poll;
    decision
}

/// Full `device/next` step: upsert presence, resolve the active and nearest
/// upcoming windows, decide, and record the decision in publish history,
/// all in one writer transaction.
pub fn next_for_device(
    store: &Store,
    device_id: &str,
    now: i64,
    default_poll: i64,
    failure_count: i64,
    daily_image_url: String,
    public_base: &str,
) -> ApiResult<Decision> {
    let decision = store.write(|conn| {
        devices::touch(conn, device_id, now, failure_count)?;
        let active = overrides::active_for(conn, device_id, now)?;
        let upcoming = overrides::nearest_upcoming_start(conn, device_id, now)?;

        let decision = decide(
            device_id,
            now,
            default_poll,
            daily_image_url,
            public_base,
            active.as_ref(),
            upcoming,
        );

        history::append_and_trim(
            conn,
            &history::NewPublish {
                device_id,
                issued_epoch: now,
                source: decision.source.as_str(),
                image_url: &decision.image_url,
                override_id: decision.active_override_id,
                poll_after_seconds: decision.poll_after_seconds,
                valid_until_epoch: decision.valid_until_epoch,
            },
        )?;
        Ok(decision)
    })?;

    tracing::info!(
        device_id,
        source = decision.source.as_str(),
        poll_after = decision.poll_after_seconds,
        override_id = ?decision.active_override_id,
        "scheduled next image"
    );
    Ok(decision)
}

/// Read-only view of the override a device would receive right now. Used by
/// the operator preview, which must not leave tracks in history.
pub fn peek_active(store: &Store, device_id: &str, now: i64) -> ApiResult<Option<OverrideRow>> {
    Ok(store.read(|conn| Ok(overrides::active_for(conn, device_id, now)?))?)
}

/// How an override's start epoch was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Window opens immediately.
    Immediate,
    /// Start pushed forward to the device's promised next wakeup so the
    /// window is not consumed while it sleeps.
    NextWakeup,
    /// Operator-provided `starts_at`, honored verbatim.
    Explicit,
}

/// Resolved placement for a new override window.
#[derive(Debug, Clone, Serialize)]
pub struct OverridePlacement {
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub start_policy: StartPolicy,
    /// Diagnostic: the device's projected next wake is at or past the end of
    /// the window, so it may never become visible.
    pub will_expire_before_effective: bool,
    /// When the window will actually be seen by a specific device; `None`
    /// for wildcard targets.
    pub expected_effective_epoch: Option<i64>,
}

/// Place a new override window relative to `now` and the target device's
/// promised wakeup.
pub fn place_override(
    target_device: &str,
    explicit_start: Option<i64>,
    duration_minutes: i64,
    now: i64,
    device_next_wakeup: Option<i64>,
) -> OverridePlacement {
    let wildcard = target_device == WILDCARD_DEVICE;
    let wakeup = if wildcard { None } else { device_next_wakeup };

    let (start_epoch, start_policy) = match explicit_start {
        Some(s) => (s, StartPolicy::Explicit),
        None => match wakeup {
            Some(w) if w > now => (w, StartPolicy::NextWakeup),
            _ => (now, StartPolicy::Immediate),
        },
    };
    let end_epoch = start_epoch + duration_minutes * 60;

    let expected_effective_epoch = if wildcard {
        None
    } else {
        Some(wakeup.map_or(start_epoch, |w| w.max(start_epoch)))
    };
    let will_expire_before_effective = matches!(wakeup, Some(w) if w >= end_epoch);

    OverridePlacement {
        start_epoch,
        end_epoch,
        start_policy,
        will_expire_before_effective,
        expected_effective_epoch,
    }
}

/// Classify a window relative to `now` for the operator listing.
pub fn window_state(now: i64, start_epoch: i64, end_epoch: i64) -> &'static str {
    if now < start_epoch {
        "upcoming"
    } else if now >= end_epoch {
        "expired"
    } else {
        "active"
    }
}
