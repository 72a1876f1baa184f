use super::activity::ActivityRecord;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use std::fmt;

/// Shown instead of a timestamp for members with no activity
pub const NO_ACTIVITY: &str = "N/A";

/// Number of days without activity after which a member is inactive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    days: u32,
}

impl Threshold {
    pub const DEFAULT_DAYS: u32 = 60;

    pub fn days(days: u32) -> Self {
        Self { days }
    }

    pub fn as_days(&self) -> u32 {
        self.days
    }

    fn as_delta(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.days))
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::days(Self::DEFAULT_DAYS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active,
    Inactive,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Active => write!(f, "Active"),
            Status::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Active when the last activity is no older than the threshold.
///
/// The boundary is inclusive: activity exactly `threshold` days before
/// `now` still counts.
pub fn classify(record: &ActivityRecord, threshold: Threshold, now: DateTime<Utc>) -> Status {
    match record.last_activity {
        Some(last) if now - last <= threshold.as_delta() => Status::Active,
        _ => Status::Inactive,
    }
}

/// ISO-8601 UTC timestamp of the last activity, or [`NO_ACTIVITY`]
pub fn last_activity_display(record: &ActivityRecord) -> String {
    match record.last_activity {
        Some(last) => last.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => NO_ACTIVITY.to_string(),
    }
}
