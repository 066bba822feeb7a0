//! Reconciliation of raw reactions and the roster into present/absent sets.
//!
//! Classification runs in two explicit passes over the reactions: every
//! member who applied the present marker is recorded present, then every
//! member who applied the absent marker is moved to absent. A member who
//! used both markers therefore ends up absent. Roster members who never
//! reacted are absent too; "no response" is not a separate state.

use crate::attendance::types::{AttendanceRecord, ChannelId, Markers, Member, MemberId, MessageId, Reaction};
use crate::channels::traits::{ReactionReader, RosterProvider};
use crate::error::Result;
use std::collections::BTreeSet;
use tracing::debug;

/// Classify the roster of one day from that day's prompt reactions.
///
/// Automated accounts are ignored on both sides. Reactors that are no longer
/// on the roster are dropped so the record always covers exactly the roster.
#[must_use]
pub fn reconcile(reactions: &[Reaction], roster: &[Member], markers: &Markers) -> AttendanceRecord {
    let humans: BTreeSet<MemberId> = roster.iter().filter(|m| !m.bot).map(|m| m.id).collect();
    let reactors = |emoji: &str| {
        reactions
            .iter()
            .filter(move |r| r.emoji == emoji)
            .flat_map(|r| r.users.iter())
            .filter(|u| !u.bot && humans.contains(&u.id))
            .map(|u| u.id)
            .collect::<Vec<_>>()
    };

    let mut record = AttendanceRecord::default();

    // Present pass.
    for id in reactors(&markers.present) {
        record.present.insert(id);
    }

    // Absent pass overrides present.
    for id in reactors(&markers.absent) {
        record.present.remove(&id);
        record.absent.insert(id);
    }

    for id in &humans {
        if !record.present.contains(id) {
            record.absent.insert(*id);
        }
    }

    record
}

/// Gathers reactions and the roster from the platform and reconciles them.
pub struct Reconciler<'a, P: ?Sized> {
    platform: &'a P,
    channel: ChannelId,
    markers: &'a Markers,
}

impl<'a, P> Reconciler<'a, P>
where
    P: ReactionReader + RosterProvider + ?Sized,
{
    pub fn new(platform: &'a P, channel: ChannelId, markers: &'a Markers) -> Self {
        Self {
            platform,
            channel,
            markers,
        }
    }

    /// Build the record for a day's prompt.
    ///
    /// `None` (no prompt recorded) yields an empty record. A prompt that can
    /// no longer be fetched surfaces as [`crate::BotError::RecordUnavailable`].
    pub async fn record_for(&self, prompt: Option<MessageId>) -> Result<AttendanceRecord> {
        let Some(message) = prompt else {
            return Ok(AttendanceRecord::default());
        };

        let markers = [self.markers.present.as_str(), self.markers.absent.as_str()];
        let reactions = self
            .platform
            .reactions(self.channel, message, &markers)
            .await?;
        let roster = self.platform.roster(self.channel).await?;
        let record = reconcile(&reactions, &roster, self.markers);
        debug!(
            "reconciled prompt {message}: {} present, {} absent",
            record.present.len(),
            record.absent.len()
        );
        Ok(record)
    }
}
