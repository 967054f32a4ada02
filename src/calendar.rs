//! Day selection and local-time helpers
//!
//! Query windows run from local midnight to the next local midnight, where
//! "local" is a fixed UTC offset taken from the config.

use crate::error::ComputeError;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeZone, Utc};

/// The date presentation currently has selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySelection {
    date: NaiveDate,
}

impl DaySelection {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    /// Today's date at the given offset
    pub fn today(offset: FixedOffset) -> Self {
        Self {
            date: Utc::now().with_timezone(&offset).date_naive(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Move forward (positive) or backward (negative) by whole days
    pub fn shift(&self, days: i64) -> Result<Self, ComputeError> {
        let step = Days::new(days.unsigned_abs());
        let shifted = if days >= 0 {
            self.date.checked_add_days(step)
        } else {
            self.date.checked_sub_days(step)
        };
        shifted
            .map(Self::new)
            .ok_or_else(|| ComputeError::DateOutOfRange(format!("{} {:+} days", self.date, days)))
    }
}

/// Parse a date in `YYYY-MM-DD` form
pub fn parse_date(raw: &str) -> Result<NaiveDate, ComputeError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| ComputeError::DateParseError(format!("{raw}: {e}")))
}

/// Parse an offset like `+02:00`, `-0530` or `Z`
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, ComputeError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| ComputeError::InvalidUtcOffset(raw.to_string()));
    }

    trimmed
        .parse::<FixedOffset>()
        .map_err(|e| ComputeError::InvalidUtcOffset(format!("{raw}: {e}")))
}

/// UTC instants of local midnight and the following local midnight
pub fn day_bounds(
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ComputeError> {
    let next = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| ComputeError::DateOutOfRange(date.to_string()))?;
    let start = local_midnight(date, offset)?;
    let end = local_midnight(next, offset)?;
    Ok((start, end))
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>, ComputeError> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ComputeError::DateOutOfRange(date.to_string()))
}

/// Renders instants as local clock times for display
#[derive(Debug, Clone)]
pub struct ClockFormatter {
    offset: FixedOffset,
    format: String,
}

impl ClockFormatter {
    pub fn new(offset: FixedOffset, format: impl Into<String>) -> Self {
        Self {
            offset,
            format: format.into(),
        }
    }

    pub fn format(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format(&self.format)
            .to_string()
    }
}
