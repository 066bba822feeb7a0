//! Core attendance types: platform identifiers, reactions, and records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw snowflake value.
            #[must_use]
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

snowflake_id!(
    /// Human member of the space.
    MemberId
);
snowflake_id!(
    /// Platform message (the daily prompt, for ledger entries).
    MessageId
);
snowflake_id!(
    /// Text channel the bot posts into or receives commands from.
    ChannelId
);
snowflake_id!(
    /// Space (guild) owning a channel and its roster.
    GuildId
);

impl MemberId {
    /// Platform mention markup, e.g. `<@1234>`.
    #[must_use]
    pub fn mention(self) -> String {
        format!("<@{}>", self.0)
    }
}

/// A member as reported by the platform, before automated accounts are filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub bot: bool,
}

impl Member {
    #[must_use]
    pub fn human(id: u64) -> Self {
        Self {
            id: MemberId(id),
            bot: false,
        }
    }

    #[must_use]
    pub fn bot(id: u64) -> Self {
        Self {
            id: MemberId(id),
            bot: true,
        }
    }
}

/// One reaction symbol on a message and every account that applied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    pub users: Vec<Member>,
}

/// The two reaction symbols that express attendance intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    pub present: String,
    pub absent: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            present: "✅".to_owned(),
            absent: "❌".to_owned(),
        }
    }
}

/// Present/absent classification of one day's roster.
///
/// Both sets are disjoint. Every roster member seen at reconciliation time
/// lands in exactly one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub present: BTreeSet<MemberId>,
    pub absent: BTreeSet<MemberId>,
}

impl AttendanceRecord {
    /// Total number of classified members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.present.len() + self.absent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present.is_empty() && self.absent.is_empty()
    }

    /// Status of `member`; anything not marked present counts as absent.
    #[must_use]
    pub fn status_of(&self, member: MemberId) -> AttendanceStatus {
        if self.present.contains(&member) {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        }
    }
}

/// Per-day outcome for a single member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// Inclusive calendar date range used by attendance queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}
