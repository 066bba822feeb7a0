//! Daily task definitions.
//!
//! Defines [`DailyTime`], the [`ScheduledTask`] with its once-per-day guard,
//! and the [`TaskResult`] executors report back.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Well-known task ID for posting the daily prompt.
pub const TASK_POST_PROMPT: &str = "post_prompt";

/// Well-known task ID for posting the daily summary.
pub const TASK_POST_SUMMARY: &str = "post_summary";

/// Local wall-clock time of day, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DailyTime {
    hour: u8,
    min: u8,
}

impl DailyTime {
    /// Returns `None` when `hour` or `min` is out of range.
    #[must_use]
    pub fn new(hour: u8, min: u8) -> Option<Self> {
        (hour < 24 && min < 60).then_some(Self { hour, min })
    }

    #[must_use]
    pub fn hour(self) -> u8 {
        self.hour
    }

    #[must_use]
    pub fn min(self) -> u8 {
        self.min
    }

    /// Minutes since local midnight.
    #[must_use]
    pub fn minute_of_day(self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.min)
    }

    fn of(time: NaiveTime) -> u32 {
        time.hour() * 60 + time.minute()
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.min)
    }
}

/// Error parsing an `HH:MM` time of day.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time of day `{0}`, expected HH:MM")]
pub struct ParseDailyTimeError(String);

impl FromStr for DailyTime {
    type Err = ParseDailyTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDailyTimeError(s.to_owned());
        let (hour, min) = s.trim().split_once(':').ok_or_else(err)?;
        let hour: u8 = hour.parse().map_err(|_| err())?;
        let min: u8 = min.parse().map_err(|_| err())?;
        Self::new(hour, min).ok_or_else(err)
    }
}

impl Serialize for DailyTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DailyTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Outcome of executing a scheduled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Task completed successfully with a summary message.
    Success(String),
    /// Task had nothing to do (e.g. already posted, no prompt recorded).
    Skipped(String),
    /// Task failed with an error message.
    Error(String),
}

/// A task that fires once per local calendar day.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    /// Unique task identifier (e.g. `"post_prompt"`).
    pub id: String,
    /// Human-readable task name.
    pub name: String,
    /// Local time the task becomes due.
    pub at: DailyTime,
    /// How long after `at` a missed tick may still fire the task.
    pub catch_up_minutes: u32,
    /// Local date the task last fired, if any.
    pub last_fired: Option<NaiveDate>,
    /// Whether the task is enabled.
    pub enabled: bool,
}

impl ScheduledTask {
    /// Create a new enabled task firing daily at `at`.
    pub fn new(id: impl Into<String>, name: impl Into<String>, at: DailyTime) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            at,
            catch_up_minutes: 1,
            last_fired: None,
            enabled: true,
        }
    }

    /// Override the catch-up window (at least one minute).
    #[must_use]
    pub fn with_catch_up(mut self, minutes: u32) -> Self {
        self.catch_up_minutes = minutes.max(1);
        self
    }

    /// Returns `true` if the task should fire at local time `now`.
    ///
    /// Due while `now` is inside `[at, at + catch_up)` and the task has not
    /// fired on `now`'s date yet.
    #[must_use]
    pub fn is_due_at(&self, now: NaiveDateTime) -> bool {
        if !self.enabled || self.last_fired == Some(now.date()) {
            return false;
        }
        let current = DailyTime::of(now.time());
        let start = self.at.minute_of_day();
        current >= start && current < start + self.catch_up_minutes
    }

    /// Record that the task fired on `date`.
    pub fn mark_fired(&mut self, date: NaiveDate) {
        self.last_fired = Some(date);
    }
}
