//! Target-config sanitization and redaction.
//!
//! Operators publish free-form JSON; only the keys the firmware understands
//! survive, each range-clamped or truncated. Unknown keys are dropped
//! silently so newer consoles can talk to older servers. Secret-bearing keys
//! are masked in every operator-facing view but delivered intact to devices.

use serde_json::{Map, Value};

use crate::auth::mask_secret;
use crate::error::{ApiError, ApiResult};

/// Keys whose values are masked in operator views.
pub const SECRET_KEYS: &[&str] = &["orchestrator_token", "photo_token"];

enum Rule {
    /// Any integer, collapsed to 0/1.
    Boolean,
    /// Integer clamped into an inclusive range.
    IntRange(i64, i64),
    /// Non-zero collapses to 2 (the panel only supports 0° and 180°).
    Rotation,
    /// String truncated to a maximum number of characters.
    Str(usize),
}

const ALLOWED: &[(&str, Rule)] = &[
    ("orchestrator_enabled", Rule::Boolean),
    ("orchestrator_base_url", Rule::Str(1024)),
    ("orchestrator_token", Rule::Str(256)),
    ("image_url_template", Rule::Str(1024)),
    ("photo_token", Rule::Str(256)),
    ("interval_minutes", Rule::IntRange(1, 1440)),
    ("retry_base_minutes", Rule::IntRange(1, 1440)),
    ("retry_max_minutes", Rule::IntRange(1, 10080)),
    ("max_failure_before_long_sleep", Rule::IntRange(1, 1000)),
    ("display_rotation", Rule::Rotation),
    ("color_process_mode", Rule::IntRange(0, 2)),
    ("dither_mode", Rule::IntRange(0, 1)),
    ("six_color_tolerance", Rule::IntRange(0, 64)),
    ("timezone", Rule::Str(64)),
];

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Filter `raw` down to the allow-list, clamping each surviving value.
///
/// Non-object payloads are rejected; unknown keys and values of the wrong
/// shape are dropped without complaint.
pub fn sanitize_config(raw: &Value) -> ApiResult<Map<String, Value>> {
    let Value::Object(obj) = raw else {
        return Err(ApiError::ClientInput("config must be a JSON object".into()));
    };

    let mut out = Map::new();
    for (key, rule) in ALLOWED {
        let Some(value) = obj.get(*key) else {
            continue;
        };
        let cleaned = match rule {
            Rule::Boolean => as_int(value).map(|v| Value::from(i64::from(v != 0))),
            Rule::IntRange(lo, hi) => as_int(value).map(|v| Value::from(v.clamp(*lo, *hi))),
            Rule::Rotation => as_int(value).map(|v| Value::from(if v != 0 { 2 } else { 0 })),
            Rule::Str(max) => value
                .as_str()
                .map(|s| Value::from(s.chars().take(*max).collect::<String>())),
        };
        if let Some(v) = cleaned {
            out.insert((*key).to_string(), v);
        }
    }
    Ok(out)
}

/// Mask secret-bearing values inside a config object for operator views.
///
/// Non-object values pass through untouched; a device that reported garbage
/// should be visible as-is.
pub fn redact_config(config: &Value) -> Value {
    let Value::Object(obj) = config else {
        return config.clone();
    };
    let redacted = obj
        .iter()
        .map(|(k, v)| {
            if SECRET_KEYS.contains(&k.as_str()) {
                let masked = v.as_str().map(mask_secret).unwrap_or_else(|| "*".repeat(4));
                (k.clone(), Value::from(masked))
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect();
    Value::Object(redacted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_is_rejected() {
        assert!(sanitize_config(&json!([1, 2])).is_err());
        assert!(sanitize_config(&json!("x")).is_err());
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let out = sanitize_config(&json!({"interval_minutes": 30, "rm_rf": true})).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["interval_minutes"], 30);
    }

    #[test]
    fn ints_are_clamped_into_range() {
        let out = sanitize_config(&json!({
            "interval_minutes": 99999,
            "retry_base_minutes": 0,
            "six_color_tolerance": -3,
        }))
        .unwrap();
        assert_eq!(out["interval_minutes"], 1440);
        assert_eq!(out["retry_base_minutes"], 1);
        assert_eq!(out["six_color_tolerance"], 0);
    }

    #[test]
    fn enabled_flag_is_booleanized() {
        let out = sanitize_config(&json!({"orchestrator_enabled": 7})).unwrap();
        assert_eq!(out["orchestrator_enabled"], 1);
        let out = sanitize_config(&json!({"orchestrator_enabled": false})).unwrap();
        assert_eq!(out["orchestrator_enabled"], 0);
    }

    #[test]
    fn rotation_collapses_to_zero_or_two() {
        let out = sanitize_config(&json!({"display_rotation": 1})).unwrap();
        assert_eq!(out["display_rotation"], 2);
        let out = sanitize_config(&json!({"display_rotation": 0})).unwrap();
        assert_eq!(out["display_rotation"], 0);
    }

    #[test]
    fn numeric_strings_parse_and_wrong_shapes_drop() {
        let out = sanitize_config(&json!({
            "interval_minutes": "45",
            "timezone": 123,
        }))
        .unwrap();
        assert_eq!(out["interval_minutes"], 45);
        assert!(!out.contains_key("timezone"));
    }

    #[test]
    fn long_strings_are_truncated() {
        let long = "x".repeat(2000);
        let out = sanitize_config(&json!({"orchestrator_base_url": long})).unwrap();
        assert_eq!(out["orchestrator_base_url"].as_str().unwrap().len(), 1024);
    }

    #[test]
    fn redaction_masks_secrets_only() {
        let cfg = json!({
            "orchestrator_token": "supersecret",
            "photo_token": "abc",
            "interval_minutes": 30,
        });
        let red = redact_config(&cfg);
        assert_eq!(red["orchestrator_token"], "su*******et");
        assert_eq!(red["photo_token"], "***");
        assert_eq!(red["interval_minutes"], 30);
    }
}
