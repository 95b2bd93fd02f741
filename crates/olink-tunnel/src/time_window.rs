//! Minute-granular time windows
//!
//! Both the tunnel path and the body key are seeded by the current UTC
//! minute, rendered as `YYYY-MM-DDTHH:MM:00Z`. The server does the same on
//! its side, so both ends agree on the seed as long as their clocks agree
//! to within a minute.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use std::fmt;
use std::str::FromStr;

/// Rendering used on the wire. Seconds are always `00`.
const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M:00Z";

/// Format accepted when parsing a rendered key back.
const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A UTC timestamp truncated to the minute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeWindowKey {
    minute: DateTime<Utc>,
    text: String,
}

impl TimeWindowKey {
    /// Window containing `instant`
    pub fn at(instant: DateTime<Utc>) -> Self {
        let secs = instant.timestamp().div_euclid(60) * 60;
        let minute = DateTime::from_timestamp(secs, 0).unwrap_or(instant);
        let text = minute.format(WINDOW_FORMAT).to_string();
        Self { minute, text }
    }

    /// Window for the local clock corrected by `offset_secs`.
    ///
    /// Offsets that leave the representable date range are ignored.
    pub fn now_with_offset(offset_secs: i64) -> Self {
        let now = Utc::now();
        Self::at(add_secs(now, offset_secs).unwrap_or(now))
    }

    /// Window for the uncorrected local clock
    pub fn now() -> Self {
        Self::now_with_offset(0)
    }

    /// Window `secs` seconds away from this one
    pub fn shifted(&self, secs: i64) -> Self {
        Self::at(add_secs(self.minute, secs).unwrap_or(self.minute))
    }

    /// The minute before this one
    pub fn previous(&self) -> Self {
        self.shifted(-60)
    }

    /// The minute after this one
    pub fn next(&self) -> Self {
        self.shifted(60)
    }

    /// Start of the minute
    pub fn instant(&self) -> DateTime<Utc> {
        self.minute
    }

    /// Wire rendering
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

fn add_secs(instant: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(secs).and_then(|delta| instant.checked_add_signed(delta))
}

impl fmt::Display for TimeWindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for TimeWindowKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let naive = NaiveDateTime::parse_from_str(s.trim(), PARSE_FORMAT)?;
        Ok(Self::at(naive.and_utc()))
    }
}
