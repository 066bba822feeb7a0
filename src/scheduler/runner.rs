//! Scheduler background loop.
//!
//! Checks the configured daily tasks against the local wall clock on every
//! tick and executes the ones that are due.

use crate::scheduler::tasks::{ScheduledTask, TaskResult};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Default interval between scheduler ticks (seconds).
pub const TICK_INTERVAL_SECS: u64 = 60;

/// Runs a scheduled task for a given local date.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &ScheduledTask, today: NaiveDate) -> TaskResult;
}

/// Background scheduler for the daily attendance tasks.
pub struct Scheduler {
    /// Registered tasks.
    tasks: Vec<ScheduledTask>,
    /// Task executor.
    executor: Arc<dyn TaskExecutor>,
    /// Time between ticks.
    tick_interval: Duration,
}

impl Scheduler {
    /// Create a scheduler with no tasks, ticking every [`TICK_INTERVAL_SECS`].
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            tasks: Vec::new(),
            executor,
            tick_interval: Duration::from_secs(TICK_INTERVAL_SECS),
        }
    }

    /// Override the tick interval (at least one second).
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_secs(1));
        self
    }

    /// Add (or replace) a task.
    pub fn add_task(&mut self, task: ScheduledTask) {
        if let Some(existing) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
        } else {
            self.tasks.push(task);
        }
    }

    /// Returns registered tasks.
    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Run the tick loop on the current task.
    ///
    /// Never returns; drop or abort the owning task to stop it.
    pub async fn run(mut self) {
        info!("scheduler started with {} tasks", self.tasks.len());
        for task in &self.tasks {
            info!("task {} runs daily at {}", task.id, task.at);
        }

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.tick_at(Local::now().naive_local()).await;
        }
    }

    /// Execute one scheduler tick at local time `now`.
    ///
    /// Tasks are marked fired before they execute, so a failing task is not
    /// retried on the same day.
    pub async fn tick_at(&mut self, now: NaiveDateTime) {
        let today = now.date();
        let due_ids: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.is_due_at(now))
            .map(|t| t.id.clone())
            .collect();

        if due_ids.is_empty() {
            debug!("scheduler tick at {now}: nothing due");
            return;
        }

        for task_id in due_ids {
            let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
                continue;
            };
            task.mark_fired(today);
            let task_snapshot = task.clone();

            debug!("executing scheduled task: {}", task_snapshot.id);
            match self.executor.execute(&task_snapshot, today).await {
                TaskResult::Success(summary) => info!("task {task_id}: {summary}"),
                TaskResult::Skipped(reason) => info!("task {task_id} skipped: {reason}"),
                TaskResult::Error(err) => error!("task {task_id} failed: {err}"),
            }
        }
    }
}
