//! Business-hours window

use crate::AllocationError;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Weekly business-hours window at a fixed UTC offset
///
/// A timestamp is inside the window when its local weekday is listed in
/// `days` and its local hour lies in `[start_hour, end_hour)`.
///
/// # Examples
///
/// ```
/// use leadflow_distribution::WorkingHours;
///
/// let hours = WorkingHours::default();
/// // Monday 2024-01-01 10:00 UTC
/// assert!(hours.contains(1_704_103_200_000));
/// // Sunday 2023-12-31 10:00 UTC
/// assert!(!hours.contains(1_704_016_800_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingHours {
    /// Offset of local time from UTC, in minutes
    pub utc_offset_minutes: i32,

    /// First business hour (inclusive, 0-23)
    pub start_hour: u32,

    /// End of business hours (exclusive, 1-24)
    pub end_hour: u32,

    /// Business days
    pub days: Vec<Weekday>,
}

impl Default for WorkingHours {
    /// Monday to Friday, 09:00 to 18:00 UTC
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            start_hour: 9,
            end_hour: 18,
            days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        }
    }
}

impl WorkingHours {
    /// Around-the-clock window, every day
    pub fn always() -> Self {
        Self {
            utc_offset_minutes: 0,
            start_hour: 0,
            end_hour: 24,
            days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
        }
    }

    /// Validate the window
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(AllocationError::Config(format!(
                "working hours must satisfy start_hour < end_hour <= 24 (got {}..{})",
                self.start_hour, self.end_hour
            )));
        }
        if self.offset().is_none() {
            return Err(AllocationError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Whether `at` (ms since epoch) falls inside the window
    ///
    /// An invalid offset or an unrepresentable timestamp counts as outside.
    pub fn contains(&self, at: u64) -> bool {
        let Some(offset) = self.offset() else {
            return false;
        };
        let Some(utc) = i64::try_from(at).ok().and_then(DateTime::<Utc>::from_timestamp_millis) else {
            return false;
        };

        let local = utc.with_timezone(&offset);
        self.days.contains(&local.weekday()) && local.hour() >= self.start_hour && local.hour() < self.end_hour
    }

    fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }
}
