//! Long running, cancellable tasks with progress reporting.
//!
//! A [`Task`] exposes progress counters and a cancellation token next to its
//! `run` method. [`TaskGroup`] composes tasks into a single task that runs
//! them sequentially or concurrently, optionally through a
//! [`ProgressGateway`] that reports each child's progress.

pub mod error;
pub mod group;
pub mod progress;
pub mod task;

pub use error::TaskError;
pub use group::{TaskGroup, TaskResults};
pub use progress::{DEFAULT_POLL_INTERVAL, LogProgress, ProgressGateway, SilentProgress};
pub use task::{FnTask, Progress, ProgressSnapshot, Task, TaskHandle};
pub use tokio_util::sync::CancellationToken;
