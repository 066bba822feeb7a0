//! Shared test utilities used across multiple test modules.
//!
//! [`FakePlatform`] is an in-memory chat platform: it hands out message ids,
//! records what was sent, and serves reactions and a fixed roster.

use crate::attendance::types::{ChannelId, Member, MessageId, Reaction};
use crate::channels::traits::{
    ChannelInboundMessage, ChannelOutboundMessage, ChatTransport, ReactionReader, RosterProvider,
};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};

/// User id of the fake bot account; it is on the roster and reacts to its own prompts.
pub const BOT_ID: u64 = 999;

pub struct FakePlatform {
    roster: Vec<Member>,
    messages: Mutex<HashMap<MessageId, Vec<Reaction>>>,
    sent: Mutex<Vec<ChannelOutboundMessage>>,
    reactions_added: Mutex<Vec<(MessageId, String)>>,
    next_id: AtomicU64,
    reaction_reads: AtomicUsize,
    sessions: AtomicUsize,
    fail_sends: AtomicBool,
    fail_roster: AtomicBool,
}

impl FakePlatform {
    /// Roster of the given human ids plus the bot account.
    pub fn new(humans: &[u64]) -> Self {
        let mut roster: Vec<Member> = humans.iter().copied().map(Member::human).collect();
        roster.push(Member::bot(BOT_ID));
        Self {
            roster,
            messages: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            reactions_added: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000),
            reaction_reads: AtomicUsize::new(0),
            sessions: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            fail_roster: AtomicBool::new(false),
        }
    }

    /// Create a message carrying the given `(emoji, human ids)` reactions.
    pub fn seed_message(&self, reactions: &[(&str, &[u64])]) -> MessageId {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let reactions = reactions
            .iter()
            .map(|(emoji, users)| Reaction {
                emoji: (*emoji).to_owned(),
                users: users.iter().copied().map(Member::human).collect(),
            })
            .collect();
        self.messages.lock().expect("messages lock").insert(id, reactions);
        id
    }

    /// Apply `emoji` to `message` as human `user`.
    pub fn react(&self, message: MessageId, emoji: &str, user: u64) {
        self.push_reaction(message, emoji, Member::human(user));
    }

    fn push_reaction(&self, message: MessageId, emoji: &str, member: Member) {
        let mut messages = self.messages.lock().expect("messages lock");
        let reactions = messages.entry(message).or_default();
        match reactions.iter_mut().find(|r| r.emoji == emoji) {
            Some(reaction) => reaction.users.push(member),
            None => reactions.push(Reaction {
                emoji: emoji.to_owned(),
                users: vec![member],
            }),
        }
    }

    pub fn sent(&self) -> Vec<ChannelOutboundMessage> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn reactions_added(&self) -> Vec<(MessageId, String)> {
        self.reactions_added.lock().expect("reactions lock").clone()
    }

    pub fn reaction_reads(&self) -> usize {
        self.reaction_reads.load(Ordering::SeqCst)
    }

    /// Number of times `run` has been called.
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_roster(&self, fail: bool) {
        self.fail_roster.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatTransport for FakePlatform {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn send(&self, message: ChannelOutboundMessage) -> Result<MessageId> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BotError::Transport("send disabled".to_owned()));
        }
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.messages.lock().expect("messages lock").insert(id, Vec::new());
        self.sent.lock().expect("sent lock").push(message);
        Ok(id)
    }

    async fn add_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<()> {
        self.reactions_added
            .lock()
            .expect("reactions lock")
            .push((message, emoji.to_owned()));
        self.push_reaction(message, emoji, Member::bot(BOT_ID));
        Ok(())
    }

    async fn run(
        &self,
        _inbound_tx: mpsc::Sender<ChannelInboundMessage>,
        ready_tx: &watch::Sender<bool>,
    ) -> Result<()> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        ready_tx.send_replace(true);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[async_trait]
impl ReactionReader for FakePlatform {
    async fn reactions(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emojis: &[&str],
    ) -> Result<Vec<Reaction>> {
        self.reaction_reads.fetch_add(1, Ordering::SeqCst);
        let reactions = self
            .messages
            .lock()
            .expect("messages lock")
            .get(&message)
            .cloned()
            .ok_or_else(|| BotError::RecordUnavailable(format!("message {message} not found")))?;
        Ok(reactions
            .into_iter()
            .filter(|r| emojis.contains(&r.emoji.as_str()))
            .collect())
    }
}

#[async_trait]
impl RosterProvider for FakePlatform {
    async fn roster(&self, _channel: ChannelId) -> Result<Vec<Member>> {
        if self.fail_roster.load(Ordering::SeqCst) {
            return Err(BotError::Transport("503 Service Unavailable".to_owned()));
        }
        Ok(self.roster.clone())
    }
}
