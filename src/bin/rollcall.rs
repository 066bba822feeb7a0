//! CLI binary for rollcall.

use clap::{Parser, Subcommand};
use rollcall::BotConfig;
use rollcall::channels::discord::DiscordAdapter;
use rollcall::channels::traits::ChatTransport;
use rollcall::channels::{check_config, run_runtime};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Rollcall: daily attendance prompts and summaries for a Discord channel.
#[derive(Parser)]
#[command(name = "rollcall", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Discord bot token (overrides the config file).
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Attendance channel id (overrides the config file).
    #[arg(long, env = "CHANNEL_ID")]
    channel_id: Option<u64>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Connect to Discord and run the daily schedule.
    Run,

    /// Validate the configuration and check the bot token.
    Check,

    /// Write the effective configuration to the config file.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rollcall=info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(BotConfig::default_config_path);
    let mut config = if cli.config.is_some() || config_path.exists() {
        BotConfig::from_file(&config_path)?
    } else {
        BotConfig::default()
    };
    if let Some(token) = cli.token {
        config.discord.bot_token = token;
    }
    if let Some(channel_id) = cli.channel_id {
        config.discord.channel_id = channel_id;
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("rollcall v{} starting", env!("CARGO_PKG_VERSION"));
            run_runtime(config).await
        }
        Command::Check => check(config).await,
        Command::InitConfig => {
            config.save_to_file(&config_path)?;
            println!("wrote {}", config_path.display());
            Ok(())
        }
    }
}

async fn check(config: BotConfig) -> anyhow::Result<()> {
    check_config(&config)?;
    let adapter = DiscordAdapter::new(&config.discord);
    if !adapter.health_check().await? {
        anyhow::bail!("discord rejected the bot token");
    }
    if let Some(channel) = config.discord.channel() {
        let guild = adapter.resolve_guild(channel).await?;
        println!("channel {channel} belongs to guild {guild}");
    }
    println!("configuration ok");
    Ok(())
}
