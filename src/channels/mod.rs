//! Chat platform runtime.
//!
//! Owns the gateway session, starts the daily scheduler once the session is
//! ready, and answers inbound commands concurrently.

pub mod discord;
pub mod traits;

use crate::attendance::ledger::AttendanceLedger;
use crate::attendance::service::AttendanceService;
use crate::attendance::types::ChannelId;
use crate::channels::discord::DiscordAdapter;
use crate::channels::traits::{AttendancePlatform, ChannelInboundMessage};
use crate::config::{BotConfig, ConfigSeverity, validate_config};
use crate::scheduler::runner::{Scheduler, TaskExecutor};
use crate::scheduler::tasks::{ScheduledTask, TASK_POST_PROMPT, TASK_POST_SUMMARY};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// First reconnect delay after a session drops.
const INITIAL_BACKOFF_SECS: u64 = 2;

/// Upper bound on the reconnect delay.
const MAX_BACKOFF_SECS: u64 = 60;

/// Log every validation issue and fail if any of them blocks startup.
///
/// # Errors
///
/// Returns an error when at least one issue has [`ConfigSeverity::Error`].
pub fn check_config(config: &BotConfig) -> anyhow::Result<()> {
    let validation = validate_config(config);
    let has_error = validation
        .iter()
        .any(|issue| issue.severity == ConfigSeverity::Error);
    for issue in validation {
        let message = format!("{}: {}", issue.title, issue.summary);
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("{message}"),
            ConfigSeverity::Error => tracing::error!("{message}"),
        }
    }
    if has_error {
        anyhow::bail!("configuration has blocking errors");
    }
    Ok(())
}

/// Run the bot against Discord until the process is stopped.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub async fn run_runtime(config: BotConfig) -> anyhow::Result<()> {
    check_config(&config)?;
    let platform: Arc<dyn AttendancePlatform> = Arc::new(DiscordAdapter::new(&config.discord));
    run_with_platform(config, platform).await
}

/// Build the scheduler holding the prompt and summary tasks.
///
/// # Errors
///
/// Returns an error if a configured trigger time does not parse.
pub fn build_scheduler(
    config: &BotConfig,
    executor: Arc<dyn TaskExecutor>,
) -> anyhow::Result<Scheduler> {
    let (prompt_at, summary_at) = config.schedule.times()?;
    let catch_up = config.schedule.catch_up_minutes;
    let tick = Duration::from_secs(config.schedule.tick_interval_secs.max(1));

    let mut scheduler = Scheduler::new(executor).with_tick_interval(tick);
    scheduler.add_task(
        ScheduledTask::new(TASK_POST_PROMPT, "Post attendance prompt", prompt_at)
            .with_catch_up(catch_up),
    );
    scheduler.add_task(
        ScheduledTask::new(TASK_POST_SUMMARY, "Post attendance summary", summary_at)
            .with_catch_up(catch_up),
    );
    Ok(scheduler)
}

/// Wait for the session, confirm the channel's roster is readable, then run
/// the scheduler. An unresolvable channel disables scheduling only.
async fn supervise_scheduler(
    scheduler: Scheduler,
    platform: Arc<dyn AttendancePlatform>,
    channel: ChannelId,
    mut ready: watch::Receiver<bool>,
) {
    if ready.wait_for(|ready| *ready).await.is_err() {
        tracing::warn!("platform session closed before it became ready");
        return;
    }

    match platform.roster(channel).await {
        Ok(members) => {
            tracing::info!("channel {channel} resolved with {} members", members.len());
        }
        Err(err) => {
            tracing::error!("cannot resolve channel {channel}: {err}; scheduling disabled");
            return;
        }
    }

    scheduler.run().await;
}

/// Returns `(delay before reconnecting, delay for the next failure)`.
///
/// A session that reached ready restarts the sequence from the initial delay.
fn reconnect_delay(backoff_secs: u64, session_was_ready: bool) -> (u64, u64) {
    let delay = if session_was_ready {
        INITIAL_BACKOFF_SECS
    } else {
        backoff_secs
    };
    (delay, delay.saturating_mul(2).min(MAX_BACKOFF_SECS))
}

/// Keep the platform session connected, reconnecting with exponential backoff.
async fn supervise_session(
    platform: Arc<dyn AttendancePlatform>,
    inbound_tx: mpsc::Sender<ChannelInboundMessage>,
    ready_tx: watch::Sender<bool>,
) {
    let mut backoff_secs = INITIAL_BACKOFF_SECS;
    loop {
        ready_tx.send_replace(false);
        match platform.run(inbound_tx.clone(), &ready_tx).await {
            Ok(()) => {
                tracing::warn!("{} session stopped; restarting", platform.id());
            }
            Err(err) => {
                tracing::warn!("{} session failed: {err}", platform.id());
            }
        }
        let (delay, next) = reconnect_delay(backoff_secs, *ready_tx.borrow());
        tracing::info!("reconnecting {} in {delay}s", platform.id());
        tokio::time::sleep(Duration::from_secs(delay)).await;
        backoff_secs = next;
    }
}

/// Run the bot against an arbitrary platform.
///
/// Returns once the platform session worker stops delivering inbound
/// messages for good.
///
/// # Errors
///
/// Returns an error if the channel or schedule configuration is unusable.
pub async fn run_with_platform(
    config: BotConfig,
    platform: Arc<dyn AttendancePlatform>,
) -> anyhow::Result<()> {
    let channel = config
        .discord
        .channel()
        .ok_or_else(|| anyhow::anyhow!("attendance channel is not configured"))?;

    let ledger = AttendanceLedger::new();
    let service = Arc::new(AttendanceService::new(
        Arc::clone(&platform),
        ledger,
        channel,
        config.markers.clone(),
    ));
    let scheduler = build_scheduler(&config, Arc::clone(&service) as Arc<dyn TaskExecutor>)?;

    let queue_size = config.discord.inbound_queue_size.max(8);
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<ChannelInboundMessage>(queue_size);
    let (ready_tx, ready_rx) = watch::channel(false);

    tracing::info!(
        "attendance runtime started on {} channel {channel}",
        platform.id()
    );

    let mut workers = JoinSet::new();

    workers.spawn(supervise_session(
        Arc::clone(&platform),
        inbound_tx,
        ready_tx,
    ));
    workers.spawn(supervise_scheduler(
        scheduler,
        Arc::clone(&platform),
        channel,
        ready_rx,
    ));

    while let Some(message) = inbound_rx.recv().await {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let author = message.author;
            if let Err(err) = service.handle_inbound(message).await {
                tracing::warn!("failed to answer message from {author}: {err}");
            }
        });
    }

    workers.abort_all();
    while workers.join_next().await.is_some() {}
    Ok(())
}
