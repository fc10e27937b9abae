//! Composite task running its children one after another or all at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::progress::{DEFAULT_POLL_INTERVAL, ProgressGateway};
use crate::task::{Progress, Task};

/// Largest share a child that is still running may contribute, so the group
/// only reaches its total once every child finished.
const IN_FLIGHT_CAP: f64 = 0.999;

pub type TaskResults<T> = Vec<Result<T, TaskError>>;

/// Runs child tasks sequentially or concurrently, aggregating their progress.
///
/// The group's own progress counts finished children: its total is the number
/// of children and a running child adds the fraction it reports. Failures are
/// recorded per child unless fast-fail is set, in which case the first failure
/// or cancellation cancels every child and becomes the group's result.
pub struct TaskGroup<T> {
    name: String,
    tasks: Vec<Arc<dyn Task<Output = T>>>,
    gateway: Arc<dyn ProgressGateway<T>>,
    concurrent: bool,
    show_sub_tasks: bool,
    fast_fail: bool,
    poll_interval: Duration,
    progress: Progress,
    token: CancellationToken,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new(
        tasks: Vec<Arc<dyn Task<Output = T>>>,
        gateway: Arc<dyn ProgressGateway<T>>,
    ) -> Self {
        let total = tasks.len() as f64;
        Self {
            name: "TaskGroup".to_string(),
            tasks,
            gateway,
            concurrent: false,
            show_sub_tasks: false,
            fast_fail: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            progress: Progress::new(total),
            token: CancellationToken::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Runs children through the progress gateway instead of bare.
    pub fn show_sub_tasks(mut self, show: bool) -> Self {
        self.show_sub_tasks = show;
        self
    }

    pub fn fast_fail(mut self, fast_fail: bool) -> Self {
        self.fast_fail = fast_fail;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn tasks(&self) -> &[Arc<dyn Task<Output = T>>] {
        &self.tasks
    }

    fn start(&self, task: &Arc<dyn Task<Output = T>>) -> JoinHandle<Result<T, TaskError>> {
        let task = Arc::clone(task);
        let gateway = self.show_sub_tasks.then(|| Arc::clone(&self.gateway));
        tracing::debug!(group = %self.name, task = task.name(), "starting child");
        tokio::spawn(async move {
            match gateway {
                Some(gateway) => gateway.run_with_progress(task).await,
                None => task.run().await,
            }
        })
    }

    fn ticker(&self) -> Interval {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    fn cancel_children(&self) {
        for task in &self.tasks {
            task.cancel();
        }
    }

    /// Cancels everything after a failure and hands the failure back.
    fn abort_with(&self, err: TaskError) -> Result<TaskResults<T>, TaskError> {
        tracing::debug!(group = %self.name, error = %err, "fast fail");
        self.cancel();
        Err(err)
    }

    fn canceled_externally(&self) -> Result<TaskResults<T>, TaskError> {
        tracing::debug!(group = %self.name, "group canceled");
        self.cancel_children();
        Err(TaskError::Canceled)
    }

    async fn run_sequential(&self) -> Result<TaskResults<T>, TaskError> {
        let mut results = Vec::with_capacity(self.tasks.len());
        let mut ticker = self.ticker();

        for (index, task) in self.tasks.iter().enumerate() {
            if self.is_canceled() {
                return self.canceled_externally();
            }
            let completed = index as f64;
            let mut handle = self.start(task);
            let outcome = loop {
                tokio::select! {
                    biased;
                    joined = &mut handle => break settle(task.name(), joined),
                    _ = self.token.cancelled() => return self.canceled_externally(),
                    _ = ticker.tick() => {
                        if task.is_canceled() {
                            break Err(TaskError::Canceled);
                        }
                        self.progress.raise_to(completed + in_flight(task.as_ref()));
                    }
                }
            };

            match outcome {
                Err(err) if self.fast_fail => return self.abort_with(err),
                Err(err) => {
                    tracing::debug!(
                        group = %self.name,
                        task = task.name(),
                        error = %err,
                        "child failed"
                    );
                    results.push(Err(err));
                }
                Ok(value) => results.push(Ok(value)),
            }
            self.progress.raise_to(completed + 1.0);
        }

        Ok(results)
    }

    async fn run_concurrent(&self) -> Result<TaskResults<T>, TaskError> {
        let mut slots: Vec<Option<Result<T, TaskError>>> =
            self.tasks.iter().map(|_| None).collect();
        let mut running: FuturesUnordered<_> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(index, task)| {
                let handle = self.start(task);
                async move { (index, handle.await) }
            })
            .collect();
        let mut ticker = self.ticker();

        while slots.iter().any(Option::is_none) {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return self.canceled_externally(),
                Some((index, joined)) = running.next() => {
                    match settle(self.tasks[index].name(), joined) {
                        Err(err) if self.fast_fail => return self.abort_with(err),
                        outcome => {
                            if slots[index].is_none() {
                                slots[index] = Some(outcome);
                            }
                        }
                    }
                }
                _ = ticker.tick() => {
                    let mut current = 0.0;
                    for (task, slot) in self.tasks.iter().zip(slots.iter_mut()) {
                        if slot.is_some() {
                            current += 1.0;
                        } else if task.is_canceled() {
                            if self.fast_fail {
                                return self.abort_with(TaskError::Canceled);
                            }
                            *slot = Some(Err(TaskError::Canceled));
                            current += 1.0;
                        } else {
                            current += in_flight(task.as_ref());
                        }
                    }
                    self.progress.raise_to(current);
                }
            }
        }

        self.progress.raise_to(self.tasks.len() as f64);
        Ok(slots.into_iter().flatten().collect())
    }
}

fn in_flight<T: Send + 'static>(task: &dyn Task<Output = T>) -> f64 {
    task.progress().fraction().min(IN_FLIGHT_CAP)
}

fn settle<T>(name: &str, joined: Result<Result<T, TaskError>, JoinError>) -> Result<T, TaskError> {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(TaskError::Panicked {
            task: name.to_string(),
        }),
        Err(_) => Err(TaskError::Canceled),
    }
}

#[async_trait]
impl<T: Send + 'static> Task for TaskGroup<T> {
    type Output = TaskResults<T>;

    fn name(&self) -> &str {
        &self.name
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn cancel_token(&self) -> &CancellationToken {
        &self.token
    }

    fn cancel(&self) {
        self.cancel_children();
        self.token.cancel();
    }

    async fn run(&self) -> Result<TaskResults<T>, TaskError> {
        tracing::debug!(
            group = %self.name,
            tasks = self.tasks.len(),
            concurrent = self.concurrent,
            fast_fail = self.fast_fail,
            "running task group"
        );
        if self.concurrent {
            self.run_concurrent().await
        } else {
            self.run_sequential().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::task::{FnTask, TaskHandle};

    #[test]
    fn settle_maps_join_outcomes() {
        assert_eq!(settle::<u8>("t", Ok(Ok(1))).unwrap(), 1);
        assert!(settle::<u8>("t", Ok(Err(TaskError::Canceled)))
            .unwrap_err()
            .is_canceled());
    }

    #[tokio::test]
    async fn empty_group_succeeds_immediately() {
        for concurrent in [false, true] {
            let group =
                TaskGroup::<u8>::new(Vec::new(), Arc::new(SilentProgress)).concurrent(concurrent);
            assert!(group.run().await.unwrap().is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_progress_stays_below_one() {
        let task = FnTask::new("half", 2.0, |_handle: TaskHandle| async { Ok(()) });
        task.progress().set_current(2.0);
        assert_eq!(in_flight::<()>(&task), IN_FLIGHT_CAP);
    }
}
