use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Point-in-time copy of a task's progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub current: f64,
    pub total: f64,
    pub message: String,
}

impl ProgressSnapshot {
    /// Share of the work done, in `0.0..=1.0`; zero when `total` is zero.
    pub fn fraction(&self) -> f64 {
        if self.total <= 0.0 {
            0.0
        } else {
            (self.current / self.total).clamp(0.0, 1.0)
        }
    }
}

/// Progress counters a running task updates and observers sample.
#[derive(Debug, Default)]
pub struct Progress {
    state: Mutex<ProgressSnapshot>,
}

impl Progress {
    pub fn new(total: f64) -> Self {
        Self {
            state: Mutex::new(ProgressSnapshot {
                total,
                ..ProgressSnapshot::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ProgressSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state().clone()
    }

    pub fn current(&self) -> f64 {
        self.state().current
    }

    pub fn total(&self) -> f64 {
        self.state().total
    }

    pub fn fraction(&self) -> f64 {
        self.state().fraction()
    }

    pub fn set_total(&self, total: f64) {
        self.state().total = total;
    }

    pub fn set_current(&self, current: f64) {
        self.state().current = current;
    }

    pub fn advance(&self, delta: f64) {
        self.state().current += delta;
    }

    /// Moves `current` up to `current`; never moves it down.
    pub fn raise_to(&self, current: f64) {
        let mut state = self.state();
        if current > state.current {
            state.current = current;
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.state().message = message.into();
    }
}

/// A cancellable unit of work that reports its progress while it runs.
///
/// Cancellation is cooperative: [`Task::cancel`] only trips the token and the
/// task is expected to notice and return [`TaskError::Canceled`] soon after.
#[async_trait]
pub trait Task: Send + Sync {
    type Output: Send + 'static;

    fn name(&self) -> &str;

    fn progress(&self) -> &Progress;

    fn cancel_token(&self) -> &CancellationToken;

    fn is_canceled(&self) -> bool {
        self.cancel_token().is_cancelled()
    }

    fn cancel(&self) {
        self.cancel_token().cancel();
    }

    async fn run(&self) -> Result<Self::Output, TaskError>;
}

/// What the body of an [`FnTask`] gets to report progress and observe
/// cancellation.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    progress: Arc<Progress>,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the task is canceled.
    pub async fn canceled(&self) {
        self.token.cancelled().await;
    }

    pub fn check_canceled(&self) -> Result<(), TaskError> {
        if self.is_canceled() {
            Err(TaskError::Canceled)
        } else {
            Ok(())
        }
    }
}

type TaskBody<T> = Box<dyn Fn(TaskHandle) -> BoxFuture<'static, Result<T, TaskError>> + Send + Sync>;

/// [`Task`] backed by an async closure.
pub struct FnTask<T> {
    name: String,
    progress: Arc<Progress>,
    token: CancellationToken,
    body: TaskBody<T>,
}

impl<T: Send + 'static> FnTask<T> {
    pub fn new<F, Fut>(name: impl Into<String>, total: f64, body: F) -> Self
    where
        F: Fn(TaskHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            progress: Arc::new(Progress::new(total)),
            token: CancellationToken::new(),
            body: Box::new(move |handle| body(handle).boxed()),
        }
    }

    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            progress: Arc::clone(&self.progress),
            token: self.token.clone(),
        }
    }
}

impl<T> std::fmt::Debug for FnTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("progress", &self.progress)
            .field("canceled", &self.token.is_cancelled())
            .finish()
    }
}

#[async_trait]
impl<T: Send + 'static> Task for FnTask<T> {
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn cancel_token(&self) -> &CancellationToken {
        &self.token
    }

    async fn run(&self) -> Result<T, TaskError> {
        (self.body)(self.handle()).await
    }
}
