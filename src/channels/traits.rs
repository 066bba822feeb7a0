use crate::attendance::types::{ChannelId, Member, MemberId, MessageId, Reaction};
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

/// Inbound message received from the chat platform.
#[derive(Debug, Clone)]
pub struct ChannelInboundMessage {
    pub author: MemberId,
    pub reply_target: ChannelId,
    pub text: String,
    /// Members explicitly mentioned in the message.
    pub mentions: Vec<MemberId>,
}

/// Rich titled block with named fields (Discord "embed").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// Outbound message posted to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutboundMessage {
    pub reply_target: ChannelId,
    pub text: String,
    pub embed: Option<Embed>,
}

impl ChannelOutboundMessage {
    pub fn text(reply_target: ChannelId, text: impl Into<String>) -> Self {
        Self {
            reply_target,
            text: text.into(),
            embed: None,
        }
    }

    pub fn embed(reply_target: ChannelId, embed: Embed) -> Self {
        Self {
            reply_target,
            text: String::new(),
            embed: Some(embed),
        }
    }
}

/// Session and messaging half of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Stable platform identifier (e.g. `discord`).
    fn id(&self) -> &'static str;

    /// Post a message and return the identifier the platform assigned to it.
    async fn send(&self, message: ChannelOutboundMessage) -> Result<MessageId>;

    /// Attach a reaction symbol to a message as the bot user.
    async fn add_reaction(&self, channel: ChannelId, message: MessageId, emoji: &str)
    -> Result<()>;

    /// Connect, flip `ready_tx` to `true` once the session is usable, and
    /// forward inbound messages until the connection drops.
    async fn run(
        &self,
        inbound_tx: mpsc::Sender<ChannelInboundMessage>,
        ready_tx: &watch::Sender<bool>,
    ) -> Result<()>;

    /// Best-effort health probe.
    async fn health_check(&self) -> Result<bool>;
}

/// Reads who applied which reaction to a message.
#[async_trait]
pub trait ReactionReader: Send + Sync {
    /// Reactions on `message` whose symbol is one of `emojis`, with the
    /// accounts that applied them. Other reactions are not read.
    ///
    /// Fails with [`crate::BotError::RecordUnavailable`] when the message has
    /// been deleted or is no longer readable.
    async fn reactions(
        &self,
        channel: ChannelId,
        message: MessageId,
        emojis: &[&str],
    ) -> Result<Vec<Reaction>>;
}

/// Supplies the member list of the space a channel belongs to.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    /// Current members of the space owning `channel`, automated accounts included.
    async fn roster(&self, channel: ChannelId) -> Result<Vec<Member>>;
}

/// Everything the attendance service needs from a chat platform.
pub trait AttendancePlatform: ChatTransport + ReactionReader + RosterProvider {}

impl<T> AttendancePlatform for T where T: ChatTransport + ReactionReader + RosterProvider {}
