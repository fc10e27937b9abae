use thiserror::Error;

/// Failures raised while resolving a question tree.
#[derive(Debug, Error)]
pub enum QmError {
    /// An answer was rejected by the question's validation.
    #[error("invalid answer for '{name}': {message}")]
    Validation { name: String, message: String },

    #[error("select question '{name}' has no options")]
    EmptyOptionSet { name: String },

    #[error("unsupported question kind '{kind}' for '{name}'")]
    UnsupportedQuestionKind { name: String, kind: String },

    #[error("canceled by user")]
    UserCancel,

    /// Failure reported by a remote function executor or a condition evaluator.
    #[error(transparent)]
    Delegate(#[from] anyhow::Error),

    #[error("question '{name}' needs a remote function executor")]
    NoRemoteExecutor { name: String },

    #[error("question '{name}' needs interactive input")]
    NeedsInteraction { name: String },

    #[error("question name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("invalid validation pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("answers must be a JSON object")]
    AnswersNotObject,
}

impl QmError {
    pub fn is_cancel(&self) -> bool {
        matches!(self, QmError::UserCancel)
    }
}
