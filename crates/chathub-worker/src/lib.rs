//! Scheduled maintenance for ChatHub.
//!
//! The [`CronScheduler`] owns a `tokio-cron-scheduler` instance and runs
//! every registered [`ScheduledJob`] on its own cron expression. The only
//! built-in job today is the expired-session sweep.

pub mod jobs;
pub mod scheduler;

pub use jobs::{ScheduledJob, SessionSweepJob};
pub use scheduler::CronScheduler;
