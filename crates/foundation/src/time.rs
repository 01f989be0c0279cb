use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

/// Wall-clock instant used for the `since` lower bound and record timestamps.
pub type Timestamp = DateTime<Utc>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp {0:?}: expected RFC 3339 or YYYY-MM-DD")]
pub struct TimestampError(pub String);

/// Encode a timestamp the way the feed expects it in query strings.
pub fn format_timestamp(t: &Timestamp) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Accepts RFC 3339 (any offset, normalized to UTC) or a bare `YYYY-MM-DD`
/// date, which is read as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, TimestampError> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| TimestampError(raw.to_string()))
}

/// Relative time windows offered by the filter panel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimePreset {
    Last24Hours,
    Last7Days,
    Last30Days,
}

impl TimePreset {
    pub const ALL: [TimePreset; 3] = [
        TimePreset::Last24Hours,
        TimePreset::Last7Days,
        TimePreset::Last30Days,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TimePreset::Last24Hours => "24h",
            TimePreset::Last7Days => "7d",
            TimePreset::Last30Days => "30d",
        }
    }

    pub fn window(self) -> Duration {
        match self {
            TimePreset::Last24Hours => Duration::hours(24),
            TimePreset::Last7Days => Duration::days(7),
            TimePreset::Last30Days => Duration::days(30),
        }
    }

    /// How far `now - since` may drift from the window and still count as
    /// this preset.
    fn tolerance(self) -> Duration {
        match self {
            TimePreset::Last30Days => Duration::hours(2),
            _ => Duration::hours(1),
        }
    }

    pub fn since(self, now: Timestamp) -> Timestamp {
        now - self.window()
    }

    /// Which preset (if any) a `since` value was produced from.
    pub fn detect(since: Option<Timestamp>, now: Timestamp) -> Option<TimePreset> {
        let since = since?;
        let elapsed = now - since;
        Self::ALL
            .into_iter()
            .find(|p| (elapsed - p.window()).abs() < p.tolerance())
    }
}

impl fmt::Display for TimePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimePreset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.label() == s.trim())
            .ok_or(())
    }
}
