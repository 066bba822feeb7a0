//! `!attendance` command: parsing and per-member history lookup.

use crate::attendance::ledger::AttendanceLedger;
use crate::attendance::reconcile::Reconciler;
use crate::attendance::types::{AttendanceStatus, ChannelId, DateRange, Markers, MemberId};
use crate::channels::traits::{ReactionReader, RosterProvider};
use crate::error::{BotError, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Command keyword recognised at the start of an inbound message.
pub const COMMAND: &str = "!attendance";

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^!attendance\s+<@!?(\d+)>\s+(\d{2}/\d{2}/\d{4})(?:\s*-\s*(\d{2}/\d{2}/\d{4})?)?",
    )
    .unwrap_or_else(|e| unreachable!("static command pattern is valid: {e}"))
});

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Why an `!attendance` request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("malformed attendance command")]
    Malformed,
    #[error("mentioned member is not a resolvable reference")]
    InvalidMember,
    #[error("start date is after end date")]
    InvertedRange,
}

/// A parsed `!attendance` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceQuery {
    pub member: MemberId,
    pub range: DateRange,
}

/// Per-day result of a query, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReport {
    pub member: MemberId,
    pub days: Vec<(NaiveDate, AttendanceStatus)>,
}

impl QueryReport {
    /// `true` when no ledger day fell inside the range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Whether `text` is addressed to the attendance command at all.
#[must_use]
pub fn is_command(text: &str) -> bool {
    text.starts_with(COMMAND)
}

/// Parse an `!attendance <@member> dd/mm/yyyy [- dd/mm/yyyy]` request.
///
/// `mentions` are the member ids the platform resolved from the message; the
/// referenced member must be one of them.
pub fn parse(text: &str, mentions: &[MemberId]) -> std::result::Result<AttendanceQuery, QueryError> {
    let caps = COMMAND_RE.captures(text.trim()).ok_or(QueryError::Malformed)?;

    let member: MemberId = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or(QueryError::Malformed)?;
    let start = caps
        .get(2)
        .and_then(|m| parse_date(m.as_str()))
        .ok_or(QueryError::Malformed)?;
    let end = match caps.get(3) {
        Some(m) => parse_date(m.as_str()).ok_or(QueryError::Malformed)?,
        None => start,
    };

    if !mentions.contains(&member) {
        return Err(QueryError::InvalidMember);
    }

    let range = DateRange::new(start, end);
    if range.is_inverted() {
        return Err(QueryError::InvertedRange);
    }

    Ok(AttendanceQuery { member, range })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Reconcile every ledger day inside the query range and classify the member.
///
/// Days without a ledger entry are skipped rather than reported absent. A
/// prompt that can no longer be read is treated as an empty record.
pub async fn run_query<P>(
    query: &AttendanceQuery,
    ledger: &AttendanceLedger,
    platform: &P,
    channel: ChannelId,
    markers: &Markers,
) -> Result<QueryReport>
where
    P: ReactionReader + RosterProvider + ?Sized,
{
    let reconciler = Reconciler::new(platform, channel, markers);
    let mut days = Vec::new();

    for (day, message) in ledger.entries_in(query.range) {
        let record = match reconciler.record_for(Some(message)).await {
            Ok(record) => record,
            Err(BotError::RecordUnavailable(reason)) => {
                warn!("attendance for {day} unavailable: {reason}");
                Default::default()
            }
            Err(e) => return Err(e),
        };
        days.push((day, record.status_of(query.member)));
    }

    Ok(QueryReport {
        member: query.member,
        days,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::attendance::types::MessageId;
    use crate::test_utils::FakePlatform;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn parses_range() {
        let query = parse("!attendance <@42> 01/01/2024 - 03/01/2024", &[MemberId(42)]).unwrap();
        assert_eq!(query.member, MemberId(42));
        assert_eq!(query.range, DateRange::new(day(1), day(3)));
    }

    #[test]
    fn parses_nickname_mention() {
        let query = parse("!attendance <@!42> 01/01/2024-02/01/2024", &[MemberId(42)]).unwrap();
        assert_eq!(query.range, DateRange::new(day(1), day(2)));
    }

    #[test]
    fn single_date_defaults_end_to_start() {
        let query = parse("!attendance <@42> 05/01/2024", &[MemberId(42)]).unwrap();
        assert_eq!(query.range, DateRange::single(day(5)));
    }

    #[test]
    fn trailing_dash_without_end_is_single_day() {
        let query = parse("!attendance <@42> 05/01/2024 -", &[MemberId(42)]).unwrap();
        assert_eq!(query.range, DateRange::single(day(5)));
    }

    #[test]
    fn free_text_member_is_malformed() {
        assert_eq!(
            parse("!attendance alice 01/01/2024", &[]),
            Err(QueryError::Malformed)
        );
    }

    #[test]
    fn wrong_date_format_is_malformed() {
        assert_eq!(
            parse("!attendance <@42> 2024-01-01", &[MemberId(42)]),
            Err(QueryError::Malformed)
        );
    }

    #[test]
    fn impossible_calendar_date_is_malformed() {
        assert_eq!(
            parse("!attendance <@42> 31/02/2024", &[MemberId(42)]),
            Err(QueryError::Malformed)
        );
    }

    #[test]
    fn unmentioned_member_is_rejected() {
        assert_eq!(
            parse("!attendance <@42> 01/01/2024", &[MemberId(7)]),
            Err(QueryError::InvalidMember)
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(
            parse("!attendance <@42> 03/01/2024 - 01/01/2024", &[MemberId(42)]),
            Err(QueryError::InvertedRange)
        );
    }

    #[test]
    fn command_prefix_detection() {
        assert!(is_command("!attendance"));
        assert!(is_command("!attendance <@1> 01/01/2024"));
        assert!(!is_command("hello !attendance"));
    }

    #[tokio::test]
    async fn query_skips_days_without_ledger_entry() {
        let platform = FakePlatform::new(&[1, 2]);
        let ledger = AttendanceLedger::new();
        let first = platform.seed_message(&[("✅", &[1])]);
        let third = platform.seed_message(&[("❌", &[1])]);
        ledger.record_prompt(day(1), first);
        ledger.record_prompt(day(3), third);
        let query = parse("!attendance <@1> 01/01/2024 - 03/01/2024", &[MemberId(1)]).unwrap();

        let report = run_query(&query, &ledger, &platform, ChannelId(10), &Markers::default())
            .await
            .unwrap();

        assert_eq!(
            report.days,
            vec![
                (day(1), AttendanceStatus::Present),
                (day(3), AttendanceStatus::Absent)
            ]
        );
    }

    #[tokio::test]
    async fn single_day_query_returns_at_most_one_line() {
        let platform = FakePlatform::new(&[1, 2]);
        let ledger = AttendanceLedger::new();
        ledger.record_prompt(day(2), platform.seed_message(&[("✅", &[2])]));
        let query = parse("!attendance <@2> 02/01/2024", &[MemberId(2)]).unwrap();

        let report = run_query(&query, &ledger, &platform, ChannelId(10), &Markers::default())
            .await
            .unwrap();

        assert_eq!(report.days, vec![(day(2), AttendanceStatus::Present)]);
    }

    #[tokio::test]
    async fn range_without_entries_is_empty_report() {
        let platform = FakePlatform::new(&[1]);
        let ledger = AttendanceLedger::new();
        ledger.record_prompt(day(9), platform.seed_message(&[("✅", &[1])]));
        let query = parse("!attendance <@1> 01/01/2024 - 03/01/2024", &[MemberId(1)]).unwrap();

        let report = run_query(&query, &ledger, &platform, ChannelId(10), &Markers::default())
            .await
            .unwrap();

        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn silent_member_reports_absent() {
        let platform = FakePlatform::new(&[1, 2]);
        let ledger = AttendanceLedger::new();
        ledger.record_prompt(day(1), platform.seed_message(&[("✅", &[1])]));
        let query = parse("!attendance <@2> 01/01/2024", &[MemberId(2)]).unwrap();

        let report = run_query(&query, &ledger, &platform, ChannelId(10), &Markers::default())
            .await
            .unwrap();

        assert_eq!(report.days, vec![(day(1), AttendanceStatus::Absent)]);
    }

    #[tokio::test]
    async fn unavailable_prompt_counts_as_absent_day() {
        let platform = FakePlatform::new(&[1]);
        let ledger = AttendanceLedger::new();
        ledger.record_prompt(day(1), MessageId(404));
        let query = parse("!attendance <@1> 01/01/2024", &[MemberId(1)]).unwrap();

        let report = run_query(&query, &ledger, &platform, ChannelId(10), &Markers::default())
            .await
            .unwrap();

        assert_eq!(report.days, vec![(day(1), AttendanceStatus::Absent)]);
    }
}
