use async_trait::async_trait;
use serde_json::Value;

use crate::answers::AnswerStore;
use crate::error::QmError;
use crate::question::{FuncDescriptor, StaticOptions};
use crate::validation::Validator;

/// Outcome of resolving one question, or of a whole traversal.
#[derive(Debug)]
pub enum InputResult {
    Success(Value),
    /// Resolved without prompting.
    Skip(Value),
    Back,
    Cancel,
    Error(QmError),
}

impl InputResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InputResult::Success(_))
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self, InputResult::Cancel)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InputResult::Success(_) => "success",
            InputResult::Skip(_) => "skip",
            InputResult::Back => "back",
            InputResult::Cancel => "cancel",
            InputResult::Error(_) => "error",
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            InputResult::Success(value) | InputResult::Skip(value) => Some(value),
            _ => None,
        }
    }
}

/// Fully resolved description of one prompt.
#[derive(Debug, Clone)]
pub struct PromptConfig<'a> {
    pub name: String,
    pub title: String,
    pub default: Option<Value>,
    pub placeholder: Option<String>,
    pub prompt: Option<String>,
    pub validation: Option<Validator<'a>>,
    pub step: usize,
    pub total_steps: usize,
    pub options: Option<StaticOptions>,
    pub return_object: bool,
    pub password: bool,
    pub numeric: bool,
}

impl PromptConfig<'_> {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            default: None,
            placeholder: None,
            prompt: None,
            validation: None,
            step: 1,
            total_steps: 1,
            options: None,
            return_object: false,
            password: false,
            numeric: false,
        }
    }
}

/// Renders questions; implemented by terminal, IDE or scripted front-ends.
#[async_trait]
pub trait PromptGateway: Send + Sync {
    /// Text, password and number input.
    async fn input_text(&self, config: PromptConfig<'_>) -> InputResult;
    async fn select_option(&self, config: PromptConfig<'_>) -> InputResult;
    async fn select_options(&self, config: PromptConfig<'_>) -> InputResult;
    async fn select_folder(&self, config: PromptConfig<'_>) -> InputResult;
}

/// Runs functions referenced by remote-function questions, dynamic defaults,
/// dynamic options and function validations.
#[async_trait]
pub trait RemoteFuncExecutor: Send + Sync {
    async fn execute(&self, func: &FuncDescriptor, answers: &AnswerStore) -> anyhow::Result<Value>;
}
