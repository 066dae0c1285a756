//! Time zone resolution for the acting user.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use super::{SlotError, SlotResult};
use crate::logging::APPOINTMENTS;

/// Parse an IANA zone name.
pub fn parse_timezone(name: &str) -> SlotResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| SlotError::UnknownTimezone(name.to_string()))
}

/// The user's zone when configured and known, otherwise `fallback`.
pub fn resolve_timezone(user_tz: Option<&str>, fallback: &str) -> SlotResult<Tz> {
    match user_tz.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => match parse_timezone(name) {
            Ok(tz) => Ok(tz),
            Err(_) => {
                warn!(target: APPOINTMENTS, timezone = name, fallback, "unknown user time zone");
                parse_timezone(fallback)
            }
        },
        None => parse_timezone(fallback),
    }
}

/// Convert a local wall-clock time in `tz` to UTC.
///
/// Ambiguous times (clocks turned back) resolve to the earlier instant.
pub fn localize(tz: Tz, local: NaiveDateTime) -> SlotResult<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(SlotError::NonexistentLocalTime(local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_user_zone_wins() {
        let tz = resolve_timezone(Some("Europe/Madrid"), "America/Mexico_City").unwrap();
        assert_eq!(tz, chrono_tz::Europe::Madrid);
    }

    #[test]
    fn test_missing_or_blank_zone_uses_fallback() {
        let tz = resolve_timezone(None, "America/Mexico_City").unwrap();
        assert_eq!(tz, chrono_tz::America::Mexico_City);

        let tz = resolve_timezone(Some("  "), "America/Mexico_City").unwrap();
        assert_eq!(tz, chrono_tz::America::Mexico_City);
    }

    #[test]
    fn test_unknown_user_zone_uses_fallback() {
        let tz = resolve_timezone(Some("Nowhere/Land"), "UTC").unwrap();
        assert_eq!(tz, chrono_tz::UTC);
    }

    #[test]
    fn test_unknown_fallback_is_error() {
        let result = resolve_timezone(None, "Nowhere/Land");
        assert!(matches!(result, Err(SlotError::UnknownTimezone(_))));
    }

    #[test]
    fn test_ambiguous_time_takes_earliest() {
        // 2024-10-27 02:30 happens twice in Madrid; first as CEST (UTC+2).
        let local = NaiveDate::from_ymd_opt(2024, 10, 27)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let utc = localize(chrono_tz::Europe::Madrid, local).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 10, 27, 0, 30, 0).unwrap());
    }
}
