use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use time::{OffsetDateTime, UtcOffset};

use crate::domain::error::DomainError;

const DATETIME_LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

pub fn localized_datetime(time: OffsetDateTime, tz: Tz) -> DateTime<Tz> {
    let utc = time.to_offset(UtcOffset::UTC);
    let datetime_utc = DateTime::<Utc>::from_timestamp(utc.unix_timestamp(), utc.nanosecond())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    tz.from_utc_datetime(&datetime_utc.naive_utc())
}

/// Human readable timestamp shown next to posts and comments.
pub fn format_display(time: OffsetDateTime, tz: Tz) -> String {
    localized_datetime(time, tz)
        .format("%d.%m.%Y %H:%M")
        .to_string()
}

/// Value for an `<input type="datetime-local">` pre-filled with `time`.
pub fn datetime_local_value(time: OffsetDateTime, tz: Tz) -> String {
    localized_datetime(time, tz)
        .format("%Y-%m-%dT%H:%M")
        .to_string()
}

/// Interpret a `datetime-local` form value as wall-clock time in `tz`.
pub fn parse_datetime_local(raw: &str, tz: Tz) -> Result<OffsetDateTime, DomainError> {
    let raw = raw.trim();
    let naive = DATETIME_LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| DomainError::invalid_timestamp(raw, "expected YYYY-MM-DDTHH:MM"))?;

    // Nonexistent wall-clock times (DST gaps) are rejected; ambiguous ones take the earlier instant.
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| DomainError::invalid_timestamp(raw, format!("does not exist in {tz}")))?;

    OffsetDateTime::from_unix_timestamp(local.timestamp())
        .map_err(|err| DomainError::invalid_timestamp(raw, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn datetime_local_round_trips_in_site_timezone() {
        let tz: Tz = "Europe/Moscow".parse().expect("tz");
        let parsed = parse_datetime_local("2024-03-01T12:30", tz).expect("parsed");

        assert_eq!(parsed, datetime!(2024-03-01 09:30 UTC));
        assert_eq!(datetime_local_value(parsed, tz), "2024-03-01T12:30");
        assert_eq!(format_display(parsed, tz), "01.03.2024 12:30");
    }

    #[test]
    fn accepts_seconds_and_rejects_garbage() {
        let tz = chrono_tz::UTC;
        assert_eq!(
            parse_datetime_local("2024-03-01T12:30:15", tz).expect("parsed"),
            datetime!(2024-03-01 12:30:15 UTC)
        );
        assert!(matches!(
            parse_datetime_local("yesterday", tz),
            Err(DomainError::InvalidTimestamp { .. })
        ));
    }
}
