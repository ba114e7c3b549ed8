use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::FormatError;

/// Which projection of a parsed timestamp a literal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    DateTime,
    Date,
    Time,
}

/// Free-text date/time reading used by `DateTime(..)`, `Date(..)` and `Time(..)`.
pub trait DateTimeParser {
    fn parse_datetime(&self, text: &str) -> Result<NaiveDateTime, FormatError>;
}

/// Tries a fixed list of common layouts with chrono.
///
/// Date-only text resolves to midnight. Time-only text is anchored on
/// 1970-01-01 since a `Time(..)` literal discards the date anyway.
/// RFC 3339 offsets are discarded, keeping the wall-clock time as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChronoDateParser;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%B %d %Y %H:%M",
    "%B %d, %Y %H:%M",
    "%b %d %Y %H:%M",
    "%b %d, %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%b %d, %Y",
];

const TIME_FORMATS: &[&str] = &[
    "%H:%M:%S%.f",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
];

impl DateTimeParser for ChronoDateParser {
    fn parse_datetime(&self, text: &str) -> Result<NaiveDateTime, FormatError> {
        let text = text.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.naive_local());
        }
        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(dt);
            }
        }
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                return Ok(date.and_time(NaiveTime::MIN));
            }
        }
        for format in TIME_FORMATS {
            if let Ok(time) = NaiveTime::parse_from_str(text, format) {
                return Ok(NaiveDate::default().and_time(time));
            }
        }

        Err(FormatError::new(
            "invalid-temporal",
            "Unrecognised date/time",
            text,
        ))
    }
}
