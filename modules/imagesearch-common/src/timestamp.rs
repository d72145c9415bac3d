// Archive capture timestamps: 14-digit `yyyyMMddHHmmss`, always UTC.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{IndexError, Result};

/// Number of digits in a full archive timestamp.
pub const ARCHIVE_TIMESTAMP_LEN: usize = 14;

const ARCHIVE_FORMAT: &str = "%Y%m%d%H%M%S";
const DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A capture instant at second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureTime(NaiveDateTime);

impl CaptureTime {
    /// Parse an archive timestamp.
    ///
    /// Short strings are zero-padded on the right and long ones truncated to 14
    /// digits. A month or day that padding leaves at zero becomes 1, so
    /// "2020" reads as 2020-01-01T00:00:00. Anything that is not all digits is
    /// rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IndexError::InvalidTimestamp(raw.to_string()));
        }

        let mut digits: String = trimmed.chars().take(ARCHIVE_TIMESTAMP_LEN).collect();
        while digits.len() < ARCHIVE_TIMESTAMP_LEN {
            digits.push('0');
        }

        let year = number(&digits[0..4]) as i32;
        let month = number(&digits[4..6]).max(1);
        let day = number(&digits[6..8]).max(1);
        let hour = number(&digits[8..10]);
        let minute = number(&digits[10..12]);
        let second = number(&digits[12..14]);

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .map(Self)
            .ok_or_else(|| IndexError::InvalidTimestamp(raw.to_string()))
    }

    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// The 14-digit archive form.
    pub fn to_archive_string(&self) -> String {
        self.0.format(ARCHIVE_FORMAT).to_string()
    }

    /// `YYYY-MM-DDThh:mm:ssZ`, no timezone conversion.
    pub fn formatted(&self) -> String {
        self.0.format(DISPLAY_FORMAT).to_string()
    }

    /// Absolute distance in seconds.
    pub fn distance(&self, other: &CaptureTime) -> i64 {
        (self.0 - other.0).num_seconds().abs()
    }
}

fn number(digits: &str) -> u32 {
    digits
        .bytes()
        .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
}

impl fmt::Display for CaptureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_archive_string())
    }
}

impl std::str::FromStr for CaptureTime {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for CaptureTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_archive_string())
    }
}

impl<'de> Deserialize<'de> for CaptureTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
