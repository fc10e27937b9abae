use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task was canceled")]
    Canceled,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
    #[error("task '{task}' panicked")]
    Panicked { task: String },
}

impl TaskError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(anyhow::Error::msg(message.into()))
    }
}
