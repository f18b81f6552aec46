//! Naive UTC datetimes.
//!
//! Archive timestamps carry no timezone: every value is stored and returned
//! as a naive datetime that is understood to be UTC. Input is accepted in a
//! fixed list of formats, tried in order; a value that matches none of them
//! is rejected.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Full datetime formats, tried before the date-only ones.
pub const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M%S",
];

/// Date-only formats. A bare date means midnight.
pub const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Human-readable list of accepted input formats, used in error messages.
pub const ACCEPTED_FORMATS_HINT: &str = "YYYY-MM-DDThh:mm:ss[.uuuuuu], YYYYMMDDThhmmss[.uuuuuu], \
     YYYY-MM-DD, YYYYMMDD";

/// Parse a date in one of [`NAIVE_DATE_FORMATS`].
pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NAIVE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Parse a datetime in one of the accepted formats.
///
/// # Examples
///
/// ```
/// use muninn_core::datetime::parse_naive_datetime;
///
/// assert_eq!(
///     parse_naive_datetime("2020-01-01T00:00:00"),
///     parse_naive_datetime("20200101T000000"),
/// );
/// assert!(parse_naive_datetime("not-a-date").is_none());
/// ```
pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| parse_naive_date(value).map(|d| d.and_time(NaiveTime::MIN)))
}

/// Format a datetime as ISO 8601 without offset.
///
/// Fractional seconds are written (as microseconds) only when non-zero.
pub fn format_naive_datetime(value: &NaiveDateTime) -> String {
    if value.nanosecond() == 0 {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        value.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// The current time as a naive UTC datetime, truncated to microseconds
/// (the resolution of a PostgreSQL `timestamp`).
pub fn utc_now() -> NaiveDateTime {
    let now = chrono::Utc::now().naive_utc();
    let micros = now.nanosecond() / 1_000 * 1_000;
    now.with_nanosecond(micros).unwrap_or(now)
}

/// Serde codec for `NaiveDateTime` fields holding naive UTC values.
///
/// ```ignore
/// #[serde(with = "muninn_core::datetime::naive_utc")]
/// pub metadata_date: NaiveDateTime,
/// ```
pub mod naive_utc {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_naive_datetime(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(d)?;
        super::parse_naive_datetime(&text).ok_or_else(|| {
            de::Error::custom(format!(
                "datetime has wrong format, use one of: {}",
                super::ACCEPTED_FORMATS_HINT
            ))
        })
    }

    /// Same codec for nullable columns.
    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(&crate::datetime::format_naive_datetime(v)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(text) => crate::datetime::parse_naive_datetime(&text)
                    .map(Some)
                    .ok_or_else(|| {
                        de::Error::custom(format!(
                            "datetime has wrong format, use one of: {}",
                            crate::datetime::ACCEPTED_FORMATS_HINT
                        ))
                    }),
            }
        }
    }
}
