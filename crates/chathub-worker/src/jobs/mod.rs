//! Built-in scheduled jobs.

pub mod session_sweep;

pub use session_sweep::SessionSweepJob;

use async_trait::async_trait;

use chathub_core::result::AppResult;

/// A unit of periodic work.
#[async_trait]
pub trait ScheduledJob: Send + Sync + std::fmt::Debug {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    /// Six-field cron expression (seconds first).
    fn schedule(&self) -> &str;

    /// Runs one tick. Returns the number of items the job acted on.
    async fn run(&self) -> AppResult<usize>;
}
