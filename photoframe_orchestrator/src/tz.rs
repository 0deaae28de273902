//! Time zone and epoch helpers.
//!
//! The orchestrator works in epoch seconds end-to-end; wall-clock time only
//! matters when resolving "today" for the daily image and when an operator
//! types a naive `starts_at` timestamp, both in the configured IANA zone.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{ApiError, ApiResult};

/// Current wall clock as epoch seconds.
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// The calendar date of `epoch` in `tz`.
pub fn local_date(epoch: i64, tz: Tz) -> NaiveDate {
    match Utc.timestamp_opt(epoch, 0) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&tz).date_naive(),
        // Out-of-range epochs collapse to the epoch origin date.
        _ => NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default(),
    }
}

/// Parse an operator-supplied `starts_at` into epoch seconds.
///
/// Accepts RFC3339 with an explicit offset, or a naive timestamp interpreted
/// in `tz`. Naive times falling into a DST gap or ambiguity are rejected so
/// the operator decides rather than the server guessing.
pub fn parse_starts_at(raw: &str, tz: Tz) -> ApiResult<i64> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).timestamp());
    }

    let naive = parse_naive(trimmed)
        .ok_or_else(|| ApiError::ClientInput("starts_at format invalid".into()))?;
    let local = tz.from_local_datetime(&naive).single().ok_or_else(|| {
        ApiError::ClientInput("starts_at is ambiguous or nonexistent in the configured timezone".into())
    })?;
    Ok(local.with_timezone(&Utc).timestamp())
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_date_respects_zone() {
        // 1700000000 is 2023-11-14T22:13:20Z: still the 14th in UTC,
        // already the 15th in Shanghai.
        assert_eq!(
            local_date(1_700_000_000, chrono_tz::UTC).to_string(),
            "2023-11-14"
        );
        assert_eq!(
            local_date(1_700_000_000, chrono_tz::Asia::Shanghai).to_string(),
            "2023-11-15"
        );
    }

    #[test]
    fn rfc3339_offset_is_honored_verbatim() {
        let got = parse_starts_at("2024-03-10T09:30:00-05:00", chrono_tz::Asia::Shanghai).unwrap();
        assert_eq!(got, 1_710_081_000);
    }

    #[test]
    fn naive_time_uses_configured_zone() {
        let utc = parse_starts_at("2024-01-15 09:30:00", chrono_tz::UTC).unwrap();
        let ny = parse_starts_at("2024-01-15 09:30:00", chrono_tz::America::New_York).unwrap();
        assert_eq!(ny - utc, 5 * 3600);
    }

    #[test]
    fn spring_forward_gap_is_rejected() {
        // America/New_York jumps from 02:00 to 03:00 on 2024-03-10.
        let res = parse_starts_at("2024-03-10T02:30:00", chrono_tz::America::New_York);
        assert!(res.is_err());
    }

    #[test]
    fn garbage_is_client_input_error() {
        assert!(matches!(
            parse_starts_at("next tuesday", chrono_tz::UTC),
            Err(ApiError::ClientInput(_))
        ));
    }
}
