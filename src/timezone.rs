//! Resolving "today" for event status classification.

use time::{Date, OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// Look up the current UTC offset for a canonical timezone name, e.g.
/// "Pacific/Auckland".
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// The current date in the given timezone.
///
/// Event status classification compares event dates against this date.
/// Returns `None` if `canonical_timezone` is not a valid timezone name.
pub fn local_today(canonical_timezone: &str) -> Option<Date> {
    get_local_offset(canonical_timezone)
        .map(|offset| OffsetDateTime::now_utc().to_offset(offset).date())
}

#[cfg(test)]
mod timezone_tests {
    use super::{get_local_offset, local_today};

    #[test]
    fn known_timezone_resolves() {
        assert!(get_local_offset("Pacific/Auckland").is_some());
        assert!(local_today("Pacific/Auckland").is_some());
    }

    #[test]
    fn unknown_timezone_returns_none() {
        assert_eq!(get_local_offset("Middle/Nowhere"), None);
        assert_eq!(local_today("Middle/Nowhere"), None);
    }
}
