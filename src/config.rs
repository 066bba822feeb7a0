//! Configuration types for the attendance bot.

use crate::attendance::types::{ChannelId, Markers};
use crate::scheduler::tasks::DailyTime;
use crate::scheduler::runner::TICK_INTERVAL_SECS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Discord credentials and target channel.
    pub discord: DiscordConfig,
    /// Daily prompt/summary times.
    pub schedule: ScheduleConfig,
    /// Reaction symbols meaning present/absent.
    pub markers: Markers,
}

/// Discord connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token used for REST and gateway authentication.
    pub bot_token: String,
    /// Channel the daily prompt and summary are posted to (`0` = unset).
    pub channel_id: u64,
    /// REST API base URL.
    pub api_base: String,
    /// Capacity of the inbound message queue.
    pub inbound_queue_size: usize,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: 0,
            api_base: "https://discord.com/api/v10".to_owned(),
            inbound_queue_size: 128,
        }
    }
}

impl DiscordConfig {
    /// The configured channel, or `None` when unset.
    #[must_use]
    pub fn channel(&self) -> Option<ChannelId> {
        (self.channel_id != 0).then_some(ChannelId(self.channel_id))
    }
}

/// Daily schedule settings. Times are local wall-clock `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// When the attendance prompt is posted.
    pub prompt_time: String,
    /// When the summary is posted; must be after `prompt_time`.
    pub summary_time: String,
    /// Seconds between scheduler ticks.
    pub tick_interval_secs: u64,
    /// Minutes after a trigger time during which a late tick still fires it.
    pub catch_up_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            prompt_time: "09:00".to_owned(),
            summary_time: "18:00".to_owned(),
            tick_interval_secs: TICK_INTERVAL_SECS,
            catch_up_minutes: 5,
        }
    }
}

impl ScheduleConfig {
    /// Parsed `(prompt, summary)` trigger times.
    ///
    /// # Errors
    ///
    /// Returns an error if either time is not a valid `HH:MM`.
    pub fn times(&self) -> crate::error::Result<(DailyTime, DailyTime)> {
        let parse = |raw: &str| {
            raw.parse::<DailyTime>()
                .map_err(|e| crate::error::BotError::Config(e.to_string()))
        };
        Ok((parse(self.prompt_time.as_str())?, parse(self.summary_time.as_str())?))
    }
}

impl BotConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::BotError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::BotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `dirs::config_dir()/rollcall/config.toml`.
    ///
    /// Override the directory with the `ROLLCALL_CONFIG_DIR` environment variable.
    pub fn default_config_path() -> PathBuf {
        if let Some(override_dir) = std::env::var_os("ROLLCALL_CONFIG_DIR") {
            return PathBuf::from(override_dir).join("config.toml");
        }
        dirs::config_dir()
            .map(|d| d.join("rollcall"))
            .unwrap_or_else(|| PathBuf::from("/tmp/rollcall-config"))
            .join("config.toml")
    }
}

/// Configuration validation issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

/// Validation issue surfaced at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub id: String,
    pub title: String,
    pub severity: ConfigSeverity,
    pub summary: String,
}

impl ConfigIssue {
    fn new(id: &str, title: &str, severity: ConfigSeverity, summary: impl Into<String>) -> Self {
        Self {
            id: id.to_owned(),
            title: title.to_owned(),
            severity,
            summary: summary.into(),
        }
    }
}

/// Validate configuration without network calls.
#[must_use]
pub fn validate_config(config: &BotConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if config.discord.bot_token.trim().is_empty() {
        issues.push(ConfigIssue::new(
            "discord-missing-token",
            "Discord token missing",
            ConfigSeverity::Error,
            "Set `discord.bot_token` or the TOKEN environment variable.",
        ));
    }

    if config.discord.channel().is_none() {
        issues.push(ConfigIssue::new(
            "discord-missing-channel",
            "Attendance channel missing",
            ConfigSeverity::Error,
            "Set `discord.channel_id` or the CHANNEL_ID environment variable.",
        ));
    }

    match config.schedule.times() {
        Ok((prompt, summary)) => {
            if summary <= prompt {
                issues.push(ConfigIssue::new(
                    "schedule-summary-not-after-prompt",
                    "Summary scheduled before prompt",
                    ConfigSeverity::Error,
                    format!(
                        "Summary time {summary} must be later in the day than prompt time {prompt}."
                    ),
                ));
            }
        }
        Err(e) => issues.push(ConfigIssue::new(
            "schedule-invalid-time",
            "Schedule time invalid",
            ConfigSeverity::Error,
            e.to_string(),
        )),
    }

    if config.schedule.tick_interval_secs == 0 {
        issues.push(ConfigIssue::new(
            "schedule-zero-tick",
            "Tick interval is zero",
            ConfigSeverity::Warning,
            "A zero tick interval is clamped to one second.",
        ));
    }

    let markers = &config.markers;
    if markers.present.trim().is_empty() || markers.absent.trim().is_empty() {
        issues.push(ConfigIssue::new(
            "markers-empty",
            "Attendance marker empty",
            ConfigSeverity::Error,
            "Both `markers.present` and `markers.absent` must be set.",
        ));
    } else if markers.present == markers.absent {
        issues.push(ConfigIssue::new(
            "markers-identical",
            "Attendance markers identical",
            ConfigSeverity::Error,
            "Present and absent markers must differ.",
        ));
    }

    issues
}
