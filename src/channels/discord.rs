use crate::attendance::types::{ChannelId, GuildId, Member, MemberId, MessageId, Reaction};
use crate::channels::traits::{
    ChannelInboundMessage, ChannelOutboundMessage, ChatTransport, Embed, ReactionReader,
    RosterProvider,
};
use crate::config::DiscordConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

// GUILDS | GUILD_MEMBERS | GUILD_MESSAGES | GUILD_MESSAGE_REACTIONS | MESSAGE_CONTENT
const GATEWAY_INTENTS: u64 = 1 | (1 << 1) | (1 << 9) | (1 << 10) | (1 << 15);

/// Page size for reaction user listings (API maximum).
const REACTION_PAGE: usize = 100;

/// Page size for guild member listings (API maximum).
const MEMBER_PAGE: usize = 1000;

/// Discord adapter using the official gateway websocket + REST API.
pub struct DiscordAdapter {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
    guilds: Mutex<HashMap<ChannelId, GuildId>>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct MemberPayload {
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct EmojiPayload {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReactionPayload {
    emoji: EmojiPayload,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    id: String,
    #[serde(default)]
    reactions: Vec<ReactionPayload>,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    guild_id: Option<String>,
}

fn snowflake<T: FromStr>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| BotError::Transport(format!("invalid snowflake `{raw}`")))
}

fn user_to_member(user: &UserPayload) -> Result<Member> {
    Ok(Member {
        id: snowflake(&user.id)?,
        bot: user.bot,
    })
}

fn embed_json(embed: &Embed) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = embed
        .fields
        .iter()
        .map(|f| json!({ "name": f.name, "value": f.value, "inline": false }))
        .collect();
    json!({
        "title": embed.title,
        "color": embed.color,
        "fields": fields,
    })
}

impl DiscordAdapter {
    pub fn new(config: &DiscordConfig) -> Self {
        Self {
            bot_token: config.bot_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
            guilds: Mutex::new(HashMap::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bot {}", self.bot_token))
    }

    async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(BotError::Transport(format!("discord {what} failed ({status}): {body}")))
    }

    /// Resolve the guild owning `channel`, caching the answer.
    ///
    /// Fails with a config error when the channel is missing, inaccessible,
    /// or not part of a guild.
    pub async fn resolve_guild(&self, channel: ChannelId) -> Result<GuildId> {
        if let Some(guild) = self
            .guilds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
        {
            return Ok(*guild);
        }

        let response = self.get(&format!("/channels/{channel}")).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Err(BotError::Config(format!(
                "cannot find channel with ID {channel} ({status}); check permissions"
            )));
        }
        let payload: ChannelPayload = Self::ensure_success(response, "channel lookup")
            .await?
            .json()
            .await?;
        let guild: GuildId = match payload.guild_id.as_deref() {
            Some(raw) => snowflake(raw)?,
            None => {
                return Err(BotError::Config(format!(
                    "channel {channel} does not belong to a guild"
                )));
            }
        };

        self.guilds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel, guild);
        Ok(guild)
    }

    async fn reaction_users(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji_key: &str,
    ) -> Result<Vec<Member>> {
        let encoded = urlencoding::encode(emoji_key);
        let mut members = Vec::new();
        let mut after: Option<MemberId> = None;

        loop {
            let mut request = self
                .get(&format!("/channels/{channel}/messages/{message}/reactions/{encoded}"))
                .query(&[("limit", REACTION_PAGE.to_string())]);
            if let Some(after) = after {
                request = request.query(&[("after", after.to_string())]);
            }
            let page: Vec<UserPayload> = Self::ensure_success(request.send().await?, "reaction users")
                .await?
                .json()
                .await?;

            for user in &page {
                members.push(user_to_member(user)?);
            }
            if page.len() < REACTION_PAGE {
                return Ok(members);
            }
            after = members.last().map(|m| m.id);
        }
    }

    fn bot_user_id(payload: &serde_json::Value) -> Option<String> {
        payload
            .get("d")
            .and_then(|d| d.get("user"))
            .and_then(|u| u.get("id"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
    }

    fn inbound_from(data: &serde_json::Value, bot_user_id: &str) -> Option<ChannelInboundMessage> {
        let author = data.get("author")?;
        let author_id = author.get("id").and_then(serde_json::Value::as_str)?;
        if author_id.is_empty() || author_id == bot_user_id {
            return None;
        }
        let author_is_bot = author
            .get("bot")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if author_is_bot {
            return None;
        }

        let channel_id = data.get("channel_id").and_then(serde_json::Value::as_str)?;
        let content = data
            .get("content")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .trim();
        if content.is_empty() {
            return None;
        }

        let mentions = data
            .get("mentions")
            .and_then(serde_json::Value::as_array)
            .map(|users| {
                users
                    .iter()
                    .filter_map(|u| u.get("id").and_then(serde_json::Value::as_str))
                    .filter_map(|id| id.parse().ok())
                    .collect()
            })
            .unwrap_or_default();

        Some(ChannelInboundMessage {
            author: author_id.parse().ok()?,
            reply_target: channel_id.parse().ok()?,
            text: content.to_owned(),
            mentions,
        })
    }
}

#[async_trait]
impl ChatTransport for DiscordAdapter {
    fn id(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, message: ChannelOutboundMessage) -> Result<MessageId> {
        let mut body = json!({});
        if !message.text.is_empty() {
            body["content"] = json!(message.text);
        }
        if let Some(embed) = &message.embed {
            body["embeds"] = json!([embed_json(embed)]);
        }

        let response = self
            .client
            .post(self.url(&format!("/channels/{}/messages", message.reply_target)))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&body)
            .send()
            .await?;
        let posted: MessagePayload = Self::ensure_success(response, "send")
            .await?
            .json()
            .await?;
        snowflake(&posted.id)
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<()> {
        let encoded = urlencoding::encode(emoji);
        let response = self
            .client
            .put(self.url(&format!(
                "/channels/{channel}/messages/{message}/reactions/{encoded}/@me"
            )))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .header("Content-Length", "0")
            .send()
            .await?;
        Self::ensure_success(response, "add reaction").await?;
        Ok(())
    }

    async fn run(
        &self,
        inbound_tx: mpsc::Sender<ChannelInboundMessage>,
        ready_tx: &watch::Sender<bool>,
    ) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(BotError::Config("discord bot token is empty".to_owned()));
        }

        let gateway_resp: serde_json::Value =
            Self::ensure_success(self.get("/gateway/bot").send().await?, "gateway lookup")
                .await?
                .json()
                .await?;

        let gateway_url = gateway_resp
            .get("url")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("wss://gateway.discord.gg");
        let ws_url = format!("{gateway_url}/?v=10&encoding=json");

        let transport = |e: tokio_tungstenite::tungstenite::Error| BotError::Transport(e.to_string());
        let (stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(transport)?;
        let (mut write, mut read) = stream.split();

        let hello = read
            .next()
            .await
            .ok_or_else(|| BotError::Transport("no hello".to_owned()))?
            .map_err(transport)?;
        let hello_text = match hello {
            Message::Text(text) => text.to_string(),
            _ => return Err(BotError::Transport("unexpected discord hello payload".to_owned())),
        };
        let hello_json: serde_json::Value = serde_json::from_str(&hello_text)
            .map_err(|e| BotError::Transport(format!("bad hello payload: {e}")))?;
        let heartbeat_interval_ms = hello_json
            .get("d")
            .and_then(|v| v.get("heartbeat_interval"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(41_250);

        let identify = json!({
            "op": 2,
            "d": {
                "token": self.bot_token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "rollcall",
                    "device": "rollcall"
                }
            }
        });
        write
            .send(Message::Text(identify.to_string()))
            .await
            .map_err(transport)?;

        let (hb_tx, mut hb_rx) = mpsc::channel::<()>(1);
        let heartbeat = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_millis(heartbeat_interval_ms));
            loop {
                interval.tick().await;
                if hb_tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        let mut sequence: Option<u64> = None;
        let mut bot_user_id = String::new();

        let result = loop {
            tokio::select! {
                _ = hb_rx.recv() => {
                    let beat = json!({"op": 1, "d": sequence});
                    if write.send(Message::Text(beat.to_string())).await.is_err() {
                        break Err(BotError::Transport("discord heartbeat failed".to_owned()));
                    }
                }
                maybe_msg = read.next() => {
                    let raw = match maybe_msg {
                        Some(Ok(Message::Text(text))) => text.to_string(),
                        Some(Ok(Message::Close(_))) | None => {
                            break Err(BotError::Transport("discord websocket closed".to_owned()));
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => {
                            break Err(BotError::Transport(format!("discord websocket error: {err}")));
                        }
                    };

                    let payload: serde_json::Value = match serde_json::from_str(&raw) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    if let Some(seq) = payload.get("s").and_then(serde_json::Value::as_u64) {
                        sequence = Some(seq);
                    }

                    match payload.get("op").and_then(serde_json::Value::as_u64) {
                        Some(1) => {
                            let beat = json!({"op": 1, "d": sequence});
                            if write.send(Message::Text(beat.to_string())).await.is_err() {
                                break Err(BotError::Transport("discord heartbeat failed".to_owned()));
                            }
                            continue;
                        }
                        Some(7) => break Err(BotError::Transport("discord requested reconnect".to_owned())),
                        Some(9) => break Err(BotError::Transport("discord session invalidated".to_owned())),
                        _ => {}
                    }

                    let event_name = payload.get("t").and_then(serde_json::Value::as_str).unwrap_or_default();
                    match event_name {
                        "READY" => {
                            bot_user_id = Self::bot_user_id(&payload).unwrap_or_default();
                            info!("logged in to discord as {bot_user_id}");
                            ready_tx.send_replace(true);
                        }
                        "MESSAGE_CREATE" => {
                            let Some(data) = payload.get("d") else {
                                continue;
                            };
                            let Some(inbound) = Self::inbound_from(data, &bot_user_id) else {
                                continue;
                            };
                            debug!("inbound message from {} in {}", inbound.author, inbound.reply_target);
                            if inbound_tx.send(inbound).await.is_err() {
                                break Err(BotError::Transport("discord inbound channel closed".to_owned()));
                            }
                        }
                        _ => {}
                    }
                }
            }
        };

        heartbeat.abort();
        result
    }

    async fn health_check(&self) -> Result<bool> {
        if self.bot_token.trim().is_empty() {
            return Ok(false);
        }
        let response = self.get("/users/@me").send().await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl ReactionReader for DiscordAdapter {
    async fn reactions(
        &self,
        channel: ChannelId,
        message: MessageId,
        emojis: &[&str],
    ) -> Result<Vec<Reaction>> {
        let response = self
            .get(&format!("/channels/{channel}/messages/{message}"))
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Err(BotError::RecordUnavailable(format!(
                "message {message} in channel {channel} ({status})"
            )));
        }
        let payload: MessagePayload = Self::ensure_success(response, "fetch message")
            .await?
            .json()
            .await?;

        let mut reactions = Vec::with_capacity(emojis.len());
        for reaction in &payload.reactions {
            let Some(name) = reaction.emoji.name.as_deref() else {
                continue;
            };
            if !emojis.contains(&name) {
                continue;
            }
            // Custom emoji are addressed as `name:id`.
            let key = match reaction.emoji.id.as_deref() {
                Some(id) => format!("{name}:{id}"),
                None => name.to_owned(),
            };
            let users = self.reaction_users(channel, message, &key).await?;
            reactions.push(Reaction {
                emoji: name.to_owned(),
                users,
            });
        }
        Ok(reactions)
    }
}

#[async_trait]
impl RosterProvider for DiscordAdapter {
    async fn roster(&self, channel: ChannelId) -> Result<Vec<Member>> {
        let guild = self.resolve_guild(channel).await?;
        let mut members = Vec::new();
        let mut after: Option<MemberId> = None;

        loop {
            let mut request = self
                .get(&format!("/guilds/{guild}/members"))
                .query(&[("limit", MEMBER_PAGE.to_string())]);
            if let Some(after) = after {
                request = request.query(&[("after", after.to_string())]);
            }
            let page: Vec<MemberPayload> = Self::ensure_success(request.send().await?, "list members")
                .await?
                .json()
                .await?;

            for member in &page {
                members.push(user_to_member(&member.user)?);
            }
            if page.len() < MEMBER_PAGE {
                break;
            }
            after = members.last().map(|m| m.id);
        }

        if members.is_empty() {
            warn!("guild {guild} returned an empty member list");
        }
        Ok(members)
    }
}
