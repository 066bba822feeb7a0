//! Rollcall: a daily attendance bot for Discord.
//!
//! Each day the bot posts a prompt to a configured channel, members react
//! with a present or absent marker, and later the same day the bot posts a
//! summary. Members can query past days with `!attendance`.
//!
//! # Architecture
//!
//! - **Attendance**: reconciles reactions against the guild roster and keeps
//!   the per-day ledger of prompt messages
//! - **Scheduler**: fires the prompt and summary once per local day
//! - **Channels**: Discord gateway session and REST calls behind
//!   platform-neutral traits

pub mod attendance;
pub mod channels;
pub mod config;
pub mod error;
pub mod scheduler;

#[cfg(test)]
pub mod test_utils;

pub use config::BotConfig;
pub use error::{BotError, Result};
