//! Attendance actions wired to a chat platform.
//!
//! [`AttendanceService`] owns the daily prompt and summary actions and the
//! `!attendance` command handler. It is the scheduler's task executor.

use crate::attendance::ledger::AttendanceLedger;
use crate::attendance::query::{self, QueryError};
use crate::attendance::reconcile::Reconciler;
use crate::attendance::report;
use crate::attendance::types::{AttendanceRecord, ChannelId, Markers, MessageId};
use crate::channels::traits::{AttendancePlatform, ChannelInboundMessage, ChannelOutboundMessage};
use crate::error::{BotError, Result};
use crate::scheduler::runner::TaskExecutor;
use crate::scheduler::tasks::{ScheduledTask, TaskResult, TASK_POST_PROMPT, TASK_POST_SUMMARY};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of the daily prompt action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Posted(MessageId),
    /// The ledger already holds a prompt for the day; nothing was sent.
    AlreadyPosted(MessageId),
}

/// Result of the daily summary action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Posted(AttendanceRecord),
    /// No prompt was recorded for the day.
    NoPrompt,
}

pub struct AttendanceService {
    platform: Arc<dyn AttendancePlatform>,
    ledger: AttendanceLedger,
    channel: ChannelId,
    markers: Markers,
}

impl AttendanceService {
    pub fn new(
        platform: Arc<dyn AttendancePlatform>,
        ledger: AttendanceLedger,
        channel: ChannelId,
        markers: Markers,
    ) -> Self {
        Self {
            platform,
            ledger,
            channel,
            markers,
        }
    }

    pub fn ledger(&self) -> &AttendanceLedger {
        &self.ledger
    }

    /// Post today's prompt, add both markers, and record it in the ledger.
    ///
    /// A second call for the same day is a no-op.
    pub async fn post_prompt(&self, today: NaiveDate) -> Result<PromptOutcome> {
        if let Some(existing) = self.ledger.lookup(today) {
            return Ok(PromptOutcome::AlreadyPosted(existing));
        }

        let message = self
            .platform
            .send(ChannelOutboundMessage::text(
                self.channel,
                report::prompt_text(today, &self.markers),
            ))
            .await?;
        self.platform
            .add_reaction(self.channel, message, &self.markers.present)
            .await?;
        self.platform
            .add_reaction(self.channel, message, &self.markers.absent)
            .await?;

        self.ledger.record_prompt(today, message);
        info!("attendance prompt {message} posted for {today}");
        Ok(PromptOutcome::Posted(message))
    }

    /// Reconcile today's prompt and post the summary embed.
    pub async fn post_summary(&self, today: NaiveDate) -> Result<SummaryOutcome> {
        let Some(message) = self.ledger.lookup(today) else {
            return Ok(SummaryOutcome::NoPrompt);
        };

        let record = self.record_for(today, message).await?;
        self.platform
            .send(ChannelOutboundMessage::embed(
                self.channel,
                report::summary_embed(today, &record),
            ))
            .await?;
        info!(
            "attendance summary posted for {today}: {} present, {} absent",
            record.present.len(),
            record.absent.len()
        );
        Ok(SummaryOutcome::Posted(record))
    }

    /// Reconcile a day, treating an unreadable prompt as an empty record.
    async fn record_for(&self, day: NaiveDate, message: MessageId) -> Result<AttendanceRecord> {
        let reconciler = Reconciler::new(&*self.platform, self.channel, &self.markers);
        match reconciler.record_for(Some(message)).await {
            Err(BotError::RecordUnavailable(reason)) => {
                warn!("attendance for {day} unavailable: {reason}");
                Ok(AttendanceRecord::default())
            }
            other => other,
        }
    }

    /// Build the reply to an inbound message, or `None` if it is not a command.
    ///
    /// Platform failures while answering a query become a failure reply.
    pub async fn reply_to(&self, message: &ChannelInboundMessage) -> Result<Option<String>> {
        if !query::is_command(&message.text) {
            return Ok(None);
        }

        let parsed = match query::parse(&message.text, &message.mentions) {
            Ok(parsed) => parsed,
            Err(QueryError::Malformed) => return Ok(Some(report::USAGE.to_owned())),
            Err(QueryError::InvalidMember) => return Ok(Some(report::INVALID_MEMBER.to_owned())),
            Err(QueryError::InvertedRange) => return Ok(Some(report::INVERTED_RANGE.to_owned())),
        };

        let result = match query::run_query(
            &parsed,
            &self.ledger,
            &*self.platform,
            self.channel,
            &self.markers,
        )
        .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("attendance query for {} failed: {e}", parsed.member);
                return Ok(Some(report::QUERY_FAILED.to_owned()));
            }
        };
        Ok(Some(report::query_reply(
            result.member,
            &result.days,
            &self.markers,
        )))
    }

    /// Answer an inbound message on the channel it came from.
    pub async fn handle_inbound(&self, message: ChannelInboundMessage) -> Result<()> {
        let Some(reply) = self.reply_to(&message).await? else {
            return Ok(());
        };
        self.platform
            .send(ChannelOutboundMessage::text(message.reply_target, reply))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskExecutor for AttendanceService {
    async fn execute(&self, task: &ScheduledTask, today: NaiveDate) -> TaskResult {
        match task.id.as_str() {
            TASK_POST_PROMPT => match self.post_prompt(today).await {
                Ok(PromptOutcome::Posted(id)) => TaskResult::Success(format!("prompt {id} posted")),
                Ok(PromptOutcome::AlreadyPosted(id)) => {
                    TaskResult::Skipped(format!("prompt {id} already posted for {today}"))
                }
                Err(e) => TaskResult::Error(format!("cannot post prompt: {e}")),
            },
            TASK_POST_SUMMARY => match self.post_summary(today).await {
                Ok(SummaryOutcome::Posted(record)) => {
                    TaskResult::Success(format!("summary posted for {} members", record.len()))
                }
                Ok(SummaryOutcome::NoPrompt) => {
                    TaskResult::Skipped(format!("no prompt recorded for {today}"))
                }
                Err(e) => TaskResult::Error(format!("cannot post summary: {e}")),
            },
            other => TaskResult::Error(format!("unknown task: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::attendance::types::MemberId;
    use crate::scheduler::tasks::DailyTime;
    use crate::test_utils::FakePlatform;

    const CHANNEL: ChannelId = ChannelId(10);

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn service(platform: &Arc<FakePlatform>) -> AttendanceService {
        AttendanceService::new(
            Arc::clone(platform) as Arc<dyn AttendancePlatform>,
            AttendanceLedger::new(),
            CHANNEL,
            Markers::default(),
        )
    }

    fn inbound(text: &str, mentions: &[u64]) -> ChannelInboundMessage {
        ChannelInboundMessage {
            author: MemberId(500),
            reply_target: ChannelId(77),
            text: text.to_owned(),
            mentions: mentions.iter().copied().map(MemberId).collect(),
        }
    }

    #[tokio::test]
    async fn prompt_posts_text_markers_and_records_ledger() {
        let platform = Arc::new(FakePlatform::new(&[1, 2]));
        let service = service(&platform);

        let outcome = service.post_prompt(day(1)).await.unwrap();

        let PromptOutcome::Posted(id) = outcome else {
            panic!("expected a new prompt, got {outcome:?}");
        };
        assert_eq!(service.ledger().lookup(day(1)), Some(id));
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_target, CHANNEL);
        assert!(sent[0].text.starts_with("Attendance for 2024-01-01"));
        assert_eq!(
            platform.reactions_added(),
            vec![(id, "✅".to_owned()), (id, "❌".to_owned())]
        );
    }

    #[tokio::test]
    async fn second_prompt_same_day_is_noop() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        let service = service(&platform);

        let first = service.post_prompt(day(1)).await.unwrap();
        let second = service.post_prompt(day(1)).await.unwrap();

        let PromptOutcome::Posted(id) = first else {
            panic!("expected first prompt to post");
        };
        assert_eq!(second, PromptOutcome::AlreadyPosted(id));
        assert_eq!(platform.sent().len(), 1);
        assert_eq!(service.ledger().len(), 1);
    }

    #[tokio::test]
    async fn summary_without_prompt_posts_nothing() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        let service = service(&platform);

        let outcome = service.post_summary(day(1)).await.unwrap();

        assert_eq!(outcome, SummaryOutcome::NoPrompt);
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn summary_reconciles_reactions_and_roster() {
        let platform = Arc::new(FakePlatform::new(&[1, 2, 3]));
        let service = service(&platform);
        let PromptOutcome::Posted(id) = service.post_prompt(day(1)).await.unwrap() else {
            panic!("expected prompt");
        };
        platform.react(id, "✅", 1);
        platform.react(id, "✅", 2);
        platform.react(id, "❌", 2);

        let outcome = service.post_summary(day(1)).await.unwrap();

        let SummaryOutcome::Posted(record) = outcome else {
            panic!("expected summary");
        };
        assert_eq!(record.present.iter().copied().collect::<Vec<_>>(), vec![MemberId(1)]);
        assert_eq!(
            record.absent.iter().copied().collect::<Vec<_>>(),
            vec![MemberId(2), MemberId(3)]
        );
        let embed = platform.sent()[1].embed.clone().expect("summary embed");
        assert_eq!(embed.fields[0].name, "Present (1)");
        assert_eq!(embed.fields[1].name, "Absent (2)");
        assert_eq!(embed.fields[1].value, "<@2>\n<@3>");
    }

    #[tokio::test]
    async fn summary_of_deleted_prompt_is_empty_record() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        let service = service(&platform);
        service.ledger().record_prompt(day(1), MessageId(404));

        let outcome = service.post_summary(day(1)).await.unwrap();

        assert_eq!(outcome, SummaryOutcome::Posted(AttendanceRecord::default()));
    }

    #[tokio::test]
    async fn non_command_messages_are_ignored() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        let service = service(&platform);

        service.handle_inbound(inbound("hello", &[])).await.unwrap();

        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_command_replies_with_usage() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        let service = service(&platform);

        service
            .handle_inbound(inbound("!attendance someone", &[]))
            .await
            .unwrap();

        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_target, ChannelId(77));
        assert_eq!(sent[0].text, report::USAGE);
    }

    #[tokio::test]
    async fn unmentioned_member_gets_invalid_member_reply() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        let service = service(&platform);

        let reply = service
            .reply_to(&inbound("!attendance <@1> 01/01/2024", &[]))
            .await
            .unwrap();

        assert_eq!(reply.as_deref(), Some(report::INVALID_MEMBER));
    }

    #[tokio::test]
    async fn query_over_two_recorded_days_skips_gap() {
        let platform = Arc::new(FakePlatform::new(&[1, 2]));
        let service = service(&platform);
        for d in [1, 3] {
            let PromptOutcome::Posted(id) = service.post_prompt(day(d)).await.unwrap() else {
                panic!("expected prompt");
            };
            if d == 1 {
                platform.react(id, "✅", 1);
            }
        }

        let reply = service
            .reply_to(&inbound("!attendance <@1> 01/01/2024 - 03/01/2024", &[1]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            reply,
            "📅 Attendance record for <@1>:\n2024-01-01: ✅ Present\n2024-01-03: ❌ Absent"
        );
    }

    #[tokio::test]
    async fn query_without_entries_says_no_records() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        let service = service(&platform);

        let reply = service
            .reply_to(&inbound("!attendance <@1> 01/01/2024 - 03/01/2024", &[1]))
            .await
            .unwrap();

        assert_eq!(
            reply.as_deref(),
            Some("No attendance records found for <@1> in the given date range.")
        );
    }

    #[tokio::test]
    async fn query_transport_failure_is_answered() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        let service = service(&platform);
        service
            .ledger()
            .record_prompt(day(1), platform.seed_message(&[("✅", &[1])]));
        platform.fail_roster(true);

        service
            .handle_inbound(inbound("!attendance <@1> 01/01/2024", &[1]))
            .await
            .unwrap();

        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_target, ChannelId(77));
        assert_eq!(sent[0].text, report::QUERY_FAILED);
    }

    #[tokio::test]
    async fn executor_dispatches_by_task_id() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        let service = service(&platform);
        let at = DailyTime::new(9, 0).unwrap();

        let prompt = ScheduledTask::new(TASK_POST_PROMPT, "Prompt", at);
        let summary = ScheduledTask::new(TASK_POST_SUMMARY, "Summary", at);
        let unknown = ScheduledTask::new("nope", "Nope", at);

        assert!(matches!(service.execute(&prompt, day(1)).await, TaskResult::Success(_)));
        assert!(matches!(service.execute(&prompt, day(1)).await, TaskResult::Skipped(_)));
        assert!(matches!(service.execute(&summary, day(1)).await, TaskResult::Success(_)));
        assert!(matches!(service.execute(&summary, day(2)).await, TaskResult::Skipped(_)));
        assert!(matches!(service.execute(&unknown, day(1)).await, TaskResult::Error(_)));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_task_error() {
        let platform = Arc::new(FakePlatform::new(&[1]));
        platform.fail_sends(true);
        let service = service(&platform);
        let task = ScheduledTask::new(TASK_POST_PROMPT, "Prompt", DailyTime::new(9, 0).unwrap());

        let result = service.execute(&task, day(1)).await;

        assert!(matches!(result, TaskResult::Error(_)));
        assert!(service.ledger().is_empty());
    }
}
