//! Gateways that run a task while showing its progress.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::TaskError;
use crate::task::Task;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[async_trait]
pub trait ProgressGateway<T: Send + 'static>: Send + Sync {
    /// Runs `task` to completion while observing its progress.
    async fn run_with_progress(&self, task: Arc<dyn Task<Output = T>>) -> Result<T, TaskError>;
}

/// Runs tasks without reporting anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

#[async_trait]
impl<T: Send + 'static> ProgressGateway<T> for SilentProgress {
    async fn run_with_progress(&self, task: Arc<dyn Task<Output = T>>) -> Result<T, TaskError> {
        task.run().await
    }
}

/// Logs percentage and estimated remaining time through `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    interval: Duration,
}

impl LogProgress {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[async_trait]
impl<T: Send + 'static> ProgressGateway<T> for LogProgress {
    async fn run_with_progress(&self, task: Arc<dyn Task<Output = T>>) -> Result<T, TaskError> {
        let started = Instant::now();
        tracing::info!(task = task.name(), "started");

        let run = task.run();
        tokio::pin!(run);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reported = 0.0;

        let result = loop {
            tokio::select! {
                result = &mut run => break result,
                _ = ticker.tick() => {
                    let snapshot = task.progress().snapshot();
                    if snapshot.total <= 0.0 || snapshot.current <= reported {
                        continue;
                    }
                    let left = (snapshot.total - snapshot.current).max(0.0) / snapshot.current;
                    let remaining = started.elapsed().mul_f64(left);
                    tracing::info!(
                        task = task.name(),
                        percent = (snapshot.fraction() * 100.0).round() as u64,
                        remaining_ms = remaining.as_millis() as u64,
                        message = %snapshot.message,
                        "progress"
                    );
                    reported = snapshot.current;
                }
            }
        };

        if task.is_canceled() {
            tracing::info!(task = task.name(), "canceled");
            return Err(TaskError::Canceled);
        }
        tracing::info!(
            task = task.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "finished"
        );
        result
    }
}
