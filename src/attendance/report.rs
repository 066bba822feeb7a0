//! Text and embed formatting for prompts, summaries, and query replies.

use crate::attendance::types::{AttendanceRecord, AttendanceStatus, Markers, MemberId};
use crate::channels::traits::{Embed, EmbedField};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Discord's `Color.blue()`.
pub const SUMMARY_COLOR: u32 = 0x3498DB;

/// Maximum length of an embed field value.
const FIELD_VALUE_LIMIT: usize = 1024;

/// Reply for malformed `!attendance` commands.
pub const USAGE: &str = "Usage: `!attendance @user dd/mm/yyyy - dd/mm/yyyy`";

/// Reply when the mentioned member cannot be resolved.
pub const INVALID_MEMBER: &str = "Please mention a valid user.";

/// Reply when the start date comes after the end date.
pub const INVERTED_RANGE: &str = "The start date must not be after the end date.";

/// Reply when attendance could not be read from the platform.
pub const QUERY_FAILED: &str = "Could not read attendance records right now. Please try again later.";

#[must_use]
pub fn prompt_text(today: NaiveDate, markers: &Markers) -> String {
    format!(
        "Attendance for {today}\nReact with {} for Present, {} for Absent.",
        markers.present, markers.absent
    )
}

#[must_use]
pub fn summary_embed(today: NaiveDate, record: &AttendanceRecord) -> Embed {
    Embed {
        title: format!("Attendance Summary for {today}"),
        color: SUMMARY_COLOR,
        fields: vec![
            EmbedField {
                name: format!("Present ({})", record.present.len()),
                value: member_list(&record.present),
            },
            EmbedField {
                name: format!("Absent ({})", record.absent.len()),
                value: member_list(&record.absent),
            },
        ],
    }
}

/// Newline-separated mentions, `None` when empty, truncated to fit one field.
fn member_list(members: &BTreeSet<MemberId>) -> String {
    if members.is_empty() {
        return "None".to_owned();
    }

    let mut value = String::new();
    for (index, member) in members.iter().enumerate() {
        let line = member.mention();
        let remaining = members.len() - index;
        let tail = format!("\n…and {remaining} more");
        let separator = usize::from(!value.is_empty());
        // Leave room for the tail unless this is the last mention.
        let reserve = if remaining > 1 { tail.len() } else { 0 };
        if value.len() + separator + line.len() + reserve > FIELD_VALUE_LIMIT {
            value.push_str(&tail);
            return value;
        }
        if separator == 1 {
            value.push('\n');
        }
        value.push_str(&line);
    }
    value
}

#[must_use]
pub fn status_line(day: NaiveDate, status: AttendanceStatus, markers: &Markers) -> String {
    match status {
        AttendanceStatus::Present => format!("{day}: {} Present", markers.present),
        AttendanceStatus::Absent => format!("{day}: {} Absent", markers.absent),
    }
}

#[must_use]
pub fn query_reply(
    member: MemberId,
    days: &[(NaiveDate, AttendanceStatus)],
    markers: &Markers,
) -> String {
    if days.is_empty() {
        return no_records(member);
    }
    let lines: Vec<String> = days
        .iter()
        .map(|(day, status)| status_line(*day, *status, markers))
        .collect();
    format!(
        "📅 Attendance record for {}:\n{}",
        member.mention(),
        lines.join("\n")
    )
}

#[must_use]
pub fn no_records(member: MemberId) -> String {
    format!(
        "No attendance records found for {} in the given date range.",
        member.mention()
    )
}
