//! Daily task scheduler.
//!
//! Fires the attendance prompt and summary once per local calendar day at
//! their configured times.

pub mod runner;
pub mod tasks;

pub use runner::{Scheduler, TaskExecutor};
pub use tasks::{DailyTime, ScheduledTask, TaskResult};
